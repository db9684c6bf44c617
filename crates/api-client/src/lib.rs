//! Typed client for the taskboard HTTP API, plus the query cache and
//! realtime subscriptions that keep client views current.

pub mod cache;
pub mod client;
pub mod sse;
pub mod subscription;

pub use cache::{key, QueryCache, QueryKey};
pub use client::{error_status, ApiClient, ChangeStream, ClientError};
pub use sse::FeedMessage;
pub use subscription::{Subscription, SubscriptionState};
pub use taskboard_api;
