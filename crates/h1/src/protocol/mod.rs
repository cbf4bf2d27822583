//! Core HTTP/1.x message model.
//!
//! - **Messages** ([`Request`], [`Response`], [`Message`]): start-line fields plus
//!   a [`HeaderStore`](header::HeaderStore) and a [`Body`](body::Body)
//! - **Streaming items** ([`MessageItem`], [`PayloadItem`], [`PayloadSize`]): what
//!   the streaming decoder yields and how a body is framed
//! - **Headers** ([`header`]): the zero-copy header store
//! - **Bodies** ([`body`]): empty, fixed and live-stream bodies
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`], [`HeaderError`])

mod message;
pub use message::Message;
pub use message::MessageItem;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;

mod response;
pub use response::Response;

mod error;
pub use error::BodySendError;
pub use error::BoxError;
pub use error::HeaderError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::ParseErrorKind;
pub use error::SendError;

pub mod body;
pub mod header;
