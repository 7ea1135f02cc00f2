pub mod session;

pub use session::{SessionProvider, StaticSessionProvider};
