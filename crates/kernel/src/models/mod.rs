//! Database models.

pub mod contact;
pub mod favorite;
pub mod info_page;
pub mod payment_gateway;
pub mod plan;
pub mod property;
pub mod role;
pub mod transaction;
pub mod user;

pub use contact::{Contact, ContactForm, ContactKind, NewContact};
pub use favorite::{Favorite, FavoriteListing};
pub use info_page::{InfoKind, InfoPage};
pub use payment_gateway::PaymentGateway;
pub use plan::{Plan, PlanType};
pub use property::{Property, PropertyListing};
pub use role::Role;
pub use transaction::{PaymentMethod, Transaction, TransactionStatus};
pub use user::User;
