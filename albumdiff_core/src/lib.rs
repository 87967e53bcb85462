pub mod similarity;
pub mod comparison;
pub mod scanner;
pub mod credentials;
#[cfg(feature = "cloud")]
pub mod google_photos;
#[cfg(feature = "cloud")]
pub mod auth;

pub use similarity::{NameScorer, SequenceRatio};
pub use comparison::LibraryComparator;
pub use scanner::{OneDriveScanner, MEDIA_EXTENSIONS};
pub use credentials::{CredentialManager, GoogleToken};
#[cfg(feature = "cloud")]
pub use google_photos::GooglePhotosClient;
#[cfg(feature = "cloud")]
pub use auth::{ClientSecret, GooglePhotosAuth, PHOTOS_READONLY_SCOPE};
