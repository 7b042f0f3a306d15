//! Plugin abstraction for packaging routers.
//!
//! A plugin is just a named bundle of routers. Registration is explicit:
//! the application hands its plugins to the bot at construction time, so
//! the full handler set is visible in one place.

use volga_core::Router;

/// A named bundle of routers.
///
/// ```rust,ignore
/// struct Greeter;
///
/// impl Plugin for Greeter {
///     fn name(&self) -> &str {
///         "greeter"
///     }
///
///     fn routers(&self) -> Vec<Router> {
///         vec![
///             Router::new("greeter").on_message(Filter::new().text("/hi"), |ctx| async move {
///                 ctx.answer("hello!").await?;
///                 Ok(())
///             }),
///         ]
///     }
/// }
/// ```
pub trait Plugin {
    /// Unique plugin name, used in logs.
    fn name(&self) -> &str;

    /// Builds the plugin's routers. Called once at registration.
    fn routers(&self) -> Vec<Router>;
}
