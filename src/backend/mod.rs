/*!
The backend capability interface.

A backend is a kernel that knows how to run the byte-level operations
(Stage 1 indexing, Stage 2 driving, minification, UTF8 validation), possibly
using architecture-specific instructions. Every compiled-in backend sits in a
process-wide registry; one becomes "active" the first time anything needs it,
picked by matching each backend's required instruction sets against what the
CPU reports (the registry is ordered most capable first, so the first match
wins). [`use_backend`] overrides the choice by name.

Switching the active backend while a parse is in flight on another thread is
unsupported; callers that switch at runtime must serialize. If no compiled-in
backend's requirements are satisfiable, every parse reports
[`Error::Unsupported`].
*/

mod portable;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    error::{Error, Result},
    parser::Parser,
};

/**
A CPU-specific parsing kernel.
*/
pub trait Backend: Sync {
    /**
    A short name the backend can be selected by, like `portable`.
    */
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /**
    The instruction sets that must all be available for this backend to run.
    */
    fn required_features(&self) -> &'static [CpuFeature];

    /**
    Stage 1: index the structural characters of `input` into the parser and
    validate UTF8.

    In streaming mode, trailing-truncation checks are relaxed so the input
    can be a window of a larger buffer.
    */
    fn stage1(&self, input: &[u8], parser: &mut Parser, streaming: bool) -> Result<()>;

    /**
    Stage 2: build the tape for a single-document input that Stage 1 already
    indexed.
    */
    fn stage2(&self, input: &[u8], parser: &mut Parser) -> Result<()>;

    /**
    Stage 2 over one document of a multi-document window, resuming at the
    first unconsumed structural.

    Returns `true` when more structurals remain after the document.
    */
    fn stage2_next(&self, input: &[u8], parser: &mut Parser) -> Result<bool>;

    /**
    Copy `input` into `dst` with insignificant whitespace removed, returning
    the number of bytes written.

    `dst` must be at least as long as `input`.
    */
    fn minify(&self, input: &[u8], dst: &mut [u8]) -> Result<usize>;

    /**
    Whether `input` is valid UTF8.
    */
    fn validate_utf8(&self, input: &[u8]) -> bool;
}

/**
An instruction set a backend may require.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CpuFeature {
    Avx2,
    Sse42,
    Pclmulqdq,
    Neon,
}

impl CpuFeature {
    /**
    Whether the running CPU has this instruction set.
    */
    pub fn is_detected(self) -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            match self {
                CpuFeature::Avx2 => is_x86_feature_detected!("avx2"),
                CpuFeature::Sse42 => is_x86_feature_detected!("sse4.2"),
                CpuFeature::Pclmulqdq => is_x86_feature_detected!("pclmulqdq"),
                CpuFeature::Neon => false,
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            // neon is baseline on aarch64
            matches!(self, CpuFeature::Neon)
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            false
        }
    }
}

/**
Every compiled-in backend, most capable first.
*/
static BACKENDS: &[&dyn Backend] = &[&portable::Portable];

const UNRESOLVED: usize = usize::MAX;
const UNSUPPORTED: usize = usize::MAX - 1;

static ACTIVE: AtomicUsize = AtomicUsize::new(UNRESOLVED);

/**
Iterate the compiled-in backends.
*/
pub fn backends() -> impl Iterator<Item = &'static dyn Backend> {
    BACKENDS.iter().copied()
}

/**
The active backend, selecting one on first use.
*/
pub fn active() -> Result<&'static dyn Backend> {
    match ACTIVE.load(Ordering::Acquire) {
        UNRESOLVED => {
            // threads racing the first selection compute the same answer,
            // so a plain store is enough
            let index = match select(CpuFeature::is_detected) {
                Some(index) => index,
                None => UNSUPPORTED,
            };

            ACTIVE.store(index, Ordering::Release);

            if index == UNSUPPORTED {
                Err(Error::Unsupported)
            } else {
                Ok(*get_unchecked!(BACKENDS, index))
            }
        }
        UNSUPPORTED => Err(Error::Unsupported),
        index => Ok(*get_unchecked!(BACKENDS, index)),
    }
}

/**
The first backend in registry order whose requirements are all detected.
*/
fn select(detected: impl Fn(CpuFeature) -> bool) -> Option<usize> {
    BACKENDS
        .iter()
        .position(|backend| backend.required_features().iter().all(|&f| detected(f)))
}

/**
Force a backend by name.

Fails with [`Error::Unsupported`] when no backend has that name or the named
backend's required instruction sets aren't available. Switching while a parse
is in flight on another thread is unsupported; callers must serialize.
*/
pub fn use_backend(name: &str) -> Result<()> {
    let index = BACKENDS
        .iter()
        .position(|backend| backend.name() == name)
        .ok_or(Error::Unsupported)?;

    if !BACKENDS[index]
        .required_features()
        .iter()
        .all(|&f| f.is_detected())
    {
        return Err(Error::Unsupported);
    }

    ACTIVE.store(index, Ordering::Release);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portable_is_always_selectable() {
        assert_eq!(Some(0), select(|_| false));

        let backend = active().unwrap();
        assert_eq!("portable", backend.name());
        assert!(backend.required_features().is_empty());
    }

    #[test]
    fn selection_fails_with_nothing_satisfiable() {
        // a registry where every backend needs something undetected
        struct Needy;

        impl Backend for Needy {
            fn name(&self) -> &'static str {
                "needy"
            }

            fn description(&self) -> &'static str {
                "requires everything"
            }

            fn required_features(&self) -> &'static [CpuFeature] {
                &[CpuFeature::Avx2, CpuFeature::Neon]
            }

            fn stage1(&self, _: &[u8], _: &mut Parser, _: bool) -> Result<()> {
                Err(Error::Unsupported)
            }

            fn stage2(&self, _: &[u8], _: &mut Parser) -> Result<()> {
                Err(Error::Unsupported)
            }

            fn stage2_next(&self, _: &[u8], _: &mut Parser) -> Result<bool> {
                Err(Error::Unsupported)
            }

            fn minify(&self, _: &[u8], _: &mut [u8]) -> Result<usize> {
                Err(Error::Unsupported)
            }

            fn validate_utf8(&self, _: &[u8]) -> bool {
                false
            }
        }

        let needy = Needy;
        let registry: &[&dyn Backend] = &[&needy];

        // no CPU reports both avx2 and neon
        let selected = registry
            .iter()
            .position(|b| b.required_features().iter().all(|&f| f.is_detected()));

        assert_eq!(None, selected);
    }

    #[test]
    fn unknown_backend_is_unsupported() {
        assert_eq!(Err(Error::Unsupported), use_backend("avx512"));
    }
}
