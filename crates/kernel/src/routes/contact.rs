//! Contact-us and property inquiry routes.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::get,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::contact::CONTACT_SCHEMA;
use crate::models::{Contact, ContactForm, ContactKind, NewContact, Plan, Property, User};
use crate::query::{ListingRequest, Page, paginate};
use crate::routes::helpers::{ApiResponse, parse_id, require_text};
use crate::services::entitlement::{self, ContactAccess, Subscription};
use crate::state::AppState;

/// Email notification to send once the contact is stored.
enum Notice {
    Inquiry {
        owner_email: String,
        property: Property,
    },
    Inbox(String),
}

/// Send the notification in the background; failures are only logged.
fn notify(state: &AppState, notice: Notice, contact: &Contact) {
    let Some(email) = state.email().cloned() else {
        return;
    };

    let from_name = contact.full_name.clone();
    let from_email = contact.email.clone();
    let message = contact.message.clone().unwrap_or_default();
    let contact_id = contact.id;

    tokio::spawn(async move {
        let result = match &notice {
            Notice::Inquiry {
                owner_email,
                property,
            } => {
                email
                    .send_property_inquiry(
                        owner_email,
                        &property.title,
                        &property.id.to_string(),
                        &from_name,
                        &from_email,
                        &message,
                    )
                    .await
            }
            Notice::Inbox(inbox) => {
                email
                    .send_contact_message(inbox, &from_name, &from_email, &message)
                    .await
            }
        };

        if let Err(e) = result {
            warn!(error = %e, contact_id = %contact_id, "failed to send contact notification");
        }
    });
}

/// POST /contact
///
/// Open to anonymous visitors; a signed-in caller is recorded as the sender.
async fn create_contact(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    body: Result<Json<ContactForm>, JsonRejection>,
) -> AppResult<ApiResponse<Contact>> {
    let Json(mut form) = body?;
    require_text(&form.email, "email")?;

    let sender = match caller {
        Some(caller) => User::find_active(state.db(), caller.id).await?,
        None => None,
    };
    if let Some(sender) = &sender {
        form.full_name = Some(sender.full_name.clone());
    }
    if form.display_name().is_empty() {
        return Err(AppError::BadRequest("fullName is required".to_string()));
    }

    let (property_id, property_owner, notice) = match form.kind {
        ContactKind::Property => {
            let raw = form
                .property_id
                .as_deref()
                .ok_or_else(|| AppError::BadRequest("property is required".to_string()))?;
            let id = parse_id(raw, "property")?;
            let property = Property::find_active(state.db(), id)
                .await?
                .ok_or_else(|| AppError::not_found("Property"))?;
            let owner = User::find_active(state.db(), property.created_by).await?;

            let notice = owner.map(|o| Notice::Inquiry {
                owner_email: o.email,
                property: property.clone(),
            });
            (Some(property.id), Some(property.created_by), notice)
        }
        ContactKind::General => {
            require_text(form.message.as_deref().unwrap_or_default(), "message")?;
            let notice = state
                .contact_inbox_email()
                .map(|inbox| Notice::Inbox(inbox.to_string()));
            (None, None, notice)
        }
    };

    let contact = Contact::create(
        state.db(),
        NewContact {
            kind: form.kind,
            user_id: sender.as_ref().map(|s| s.id),
            property_id,
            property_owner,
            form,
        },
    )
    .await?;

    if let Some(property_id) = property_id {
        Property::record_inquiry(state.db(), property_id).await?;
    }

    info!(contact_id = %contact.id, kind = %contact.kind, "contact received");

    if let Some(notice) = notice {
        notify(&state, notice, &contact);
    }

    Ok(ApiResponse::created(
        format!("{} successfully sent a message", contact.full_name),
        contact,
    ))
}

/// GET /contact
async fn list_contacts(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<Contact>>> {
    caller.require_admin()?;

    let request = ListingRequest::from_params(&params, &CONTACT_SCHEMA);
    let page = request.fetch(state.db(), &CONTACT_SCHEMA).await?;

    Ok(ApiResponse::ok("Contacts retrieved", page))
}

/// GET /contact/mine
///
/// Inquiries about the caller's listings, for subscribers whose plan
/// includes contact views. Admins see every contact.
async fn list_my_contacts(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<Contact>>> {
    let user = User::find_active(state.db(), caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let access =
        entitlement::check_contact_access(caller.role, &Subscription::of(&user), Utc::now())?;

    let request = ListingRequest::from_params(&params, &CONTACT_SCHEMA);
    let builder = request.builder(&CONTACT_SCHEMA)?;
    let builder = match access {
        ContactAccess::Unrestricted => builder,
        ContactAccess::RequiresPlan(plan_id) => {
            let plan = Plan::find_by_id(state.db(), plan_id).await?;
            entitlement::check_plan_views_contact(plan.as_ref())?;
            builder.scoped_to("property_owner", caller.id)
        }
    };

    let page = paginate(state.db(), &builder, &request.page).await?;

    Ok(ApiResponse::ok("Contacts retrieved", page))
}

/// GET /contact/{id}
async fn get_contact(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Contact>> {
    caller.require_agent_or_admin()?;
    let id = parse_id(&id, "contact")?;

    let contact = Contact::find_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Contact"))?;

    // Agents only see inquiries about their own listings.
    if !caller.role.is_admin() && contact.property_owner != Some(caller.id) {
        return Err(AppError::not_found("Contact"));
    }

    Ok(ApiResponse::ok("Contact retrieved", contact))
}

/// Create the contact router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact", get(list_contacts).post(create_contact))
        .route("/contact/mine", get(list_my_contacts))
        .route("/contact/{id}", get(get_contact))
}
