pub mod client;
pub mod types;

pub use client::{RipFunClient, RipFunError, RIP_FUN_BASE};
pub use types::{api_profile, AddressUser, digital_card_from_owned, OwnedCardsResponse};
