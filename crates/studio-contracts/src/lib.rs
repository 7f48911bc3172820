pub mod category;
pub mod commands;
pub mod events;
pub mod image;
pub mod keywords;
pub mod session;
pub mod settings;
pub mod transcript;

pub use category::{Audience, Category, Locale, CATEGORY_COUNT};
pub use image::ImageData;
pub use keywords::KeywordSet;
pub use session::{Action, BrainstormView, PendingOperation, Rejected, Session, Step, TransientError};
pub use transcript::{Role, Transcript, Turn};
