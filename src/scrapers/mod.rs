pub mod browser;
pub mod evler;
pub mod traits;
pub mod types;

pub use browser::BrowserRenderer;
pub use evler::EvlerClient;
pub use traits::{CountProbe, PageFetcher};
pub use types::{RenderMode, SearchParams, SortOrder};
