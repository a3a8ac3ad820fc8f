//! Driver layer for browser automation.
//!
//! This crate owns the one browser session an invocation uses and the DOM
//! helpers the extraction cascade queries through.
//!
//! - [`film_browser::session::BrowserSession`]: WebDriver client wrapper with scoped teardown
//! - [`film_browser::page::FilmPage`]: DOM helpers over the live page
//! - [`film_browser::page::RenderedPage`]: the query surface strategies depend on
//! - [`film_browser::launch`]: launch arguments and capabilities
pub mod film_browser;
