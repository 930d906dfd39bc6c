pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod money;

pub use domain::attachment::{Attachment, AttachmentKind};
pub use domain::client::{Client, ClientDraft, ClientEmail};
pub use domain::product::{Product, ProductDraft};
pub use domain::quote::{
    computed_total, ClientHeader, Quote, QuoteDetail, QuoteItem, QuoteItemDetail, QuoteItemInput,
    QuoteStatus,
};
pub use domain::user::User;
pub use errors::ServiceError;
