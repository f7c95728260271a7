//! Preprocessor event sink.
//!
//! A language-server layer subscribes here to observe macro uses, include
//! edges, and define/undef events in emission order, which equals source
//! order after expansion.

use crate::tokenizer::PpToken;

/// Consumer contract for preprocessor events. All methods default to no-ops
/// so implementors only override what they track.
pub trait PpCallback {
    /// An `#include` directive was seen; `header` is the angle- or
    /// quote-form header name token.
    fn on_include_directive(&mut self, header: &PpToken) {
        let _ = header;
    }

    /// A macro was defined. `params` is empty for object-like macros.
    fn on_define_directive(&mut self, name: &PpToken, params: &[PpToken]) {
        let _ = (name, params);
    }

    fn on_undef_directive(&mut self, name: &PpToken) {
        let _ = name;
    }

    /// `#ifdef` or (`is_ndef`) `#ifndef` was seen.
    fn on_if_def_directive(&mut self, name: &PpToken, is_ndef: bool) {
        let _ = (name, is_ndef);
    }

    fn on_enter_included_file(&mut self) {}

    fn on_exit_included_file(&mut self) {}

    /// A macro use is about to be expanded.
    fn on_macro_expansion(&mut self, macro_use: &PpToken) {
        let _ = macro_use;
    }

    /// A token reached the final stream. Primarily internal; optional to
    /// downstream consumers.
    fn on_yield_token(&mut self, token: &PpToken) {
        let _ = token;
    }
}

/// The do-nothing callback used when no consumer is attached.
pub struct NullCallback;

impl PpCallback for NullCallback {}
