use anyhow::Result;
use async_trait::async_trait;

/// The narrow slice of the sound server this daemon drives.
///
/// "No profile" (`Ok(None)`) means the card is not currently realized as
/// sink/source objects, commonly because the underlying device is not
/// connected yet; it is not an error.
#[async_trait]
pub trait SoundServer: Send + Sync + 'static {
    /// Name of the current default sink.
    async fn default_sink(&self) -> Result<String>;

    /// Name of the current default source.
    async fn default_source(&self) -> Result<String>;

    /// Make `name` the default sink.
    async fn set_default_sink(&self, name: &str) -> Result<()>;

    /// Make `name` the default source.
    async fn set_default_source(&self, name: &str) -> Result<()>;

    /// The active profile of the named card, or `None` while the card is not
    /// realized.
    async fn profile(&self, card: &str) -> Result<Option<String>>;

    /// Switch the named card to `profile`.
    async fn set_profile(&self, card: &str, profile: &str) -> Result<()>;
}
