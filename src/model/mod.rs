use derive_new::new;
use serde::{Deserialize, Serialize};

pub use ids::*;
pub use post::*;
pub use timestamp::*;
pub use user::*;
pub use view::*;

mod ids;
mod post;
mod timestamp;
mod user;
mod view;
