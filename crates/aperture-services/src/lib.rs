//! Client-side orchestration over the hosted backend: session/profile
//! state, feed aggregation, the post upload pipeline, and engagement
//! mutators. A front end talks to these services; the services talk to the
//! gateway traits in `aperture-core` and never to the wire directly.

pub mod composer;
pub mod engagement;
pub mod feed;
pub mod media;
pub mod relative;
pub mod session;

pub use composer::{Composer, Draft, UploadPhase};
pub use engagement::{Engagement, LikeState};
pub use feed::Feed;
pub use session::{SessionManager, SessionSnapshot};
