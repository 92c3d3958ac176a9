pub mod dom;
pub mod events;
pub mod protocol;
pub mod embed;
pub mod catalog;
pub mod select;
pub mod host;

pub use embed::{build_source, EmbedConfig, EmbedElement};
pub use events::Window;
pub use protocol::{decode, HeightUpdate};

/// Render a standalone `<caniuse-embed>` for `config` as HTML.
/// This is the primary entry point for one-off markup.
pub fn render_embed(config: EmbedConfig) -> String {
    EmbedElement::with_config(config).render().to_html()
}
