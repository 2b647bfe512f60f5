//! Shared error plumbing for the workspace crates.
//!
//! - [`Location`] is captured implicitly by `snafu` error variants through
//!   `#[snafu(implicit)]` so every error records the call site that built it.
//! - [`GenericError`] is a `whatever` error for binaries and examples.
//! - [`Report`] renders an error together with its source chain, and the
//!   location of every error in the chain whose type implements
//!   [`HasLocation`].

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::{error::Error, fmt};

use snafu::{GenerateImplicitData, Snafu};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location(&'static core::panic::Location<'static>);

impl Location {
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

impl Default for Location {
    #[track_caller]
    fn default() -> Self {
        Self(core::panic::Location::caller())
    }
}

impl GenerateImplicitData for Location {
    #[track_caller]
    fn generate() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Snafu)]
#[snafu(whatever, display("{message}"))]
pub struct GenericError {
    message: String,
    #[snafu(implicit)]
    location: Location,
    #[snafu(source(from(Box<dyn Error>, Some)))]
    source: Option<Box<dyn Error>>,
}

/// An error that records where it was built.
pub trait HasLocation {
    fn location(&self) -> Location;
}

impl HasLocation for GenericError {
    fn location(&self) -> Location {
        self.location
    }
}

type Locator = fn(&(dyn Error + 'static)) -> Option<Location>;

fn locate<T>(error: &(dyn Error + 'static)) -> Option<Location>
where
    T: Error + HasLocation + 'static,
{
    error.downcast_ref::<T>().map(HasLocation::location)
}

/// Renders an error and every error in its `source()` chain.
///
/// Errors in the chain are printed with their location when their type is
/// known to the report. [`GenericError`] always is; other types are added
/// with [`Report::locate`].
///
/// ```
/// use snafu_utils::{GenericError, HasLocation as _, Report};
///
/// let err: GenericError = snafu::FromString::without_source("arena exhausted".into());
/// let location = err.location();
/// assert_eq!(
///     Report::new(err).to_string(),
///     format!("Error: arena exhausted\n  at {location}\n")
/// );
/// ```
pub struct Report<E> {
    error: E,
    locators: Vec<Locator>,
}

impl<E> fmt::Debug for Report<E>
where
    E: Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<E> fmt::Display for Report<E>
where
    E: Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.error)?;
        if let Some(loc) = self.location_of(&self.error) {
            writeln!(f, "  at {loc}")?;
        }
        let mut source = self.error.source();
        if source.is_some() {
            writeln!(f)?;
            writeln!(f, "Caused by:")?;
        }
        let mut index = 0;
        while let Some(s) = source {
            writeln!(f, "{index:4}: {s}")?;
            if let Some(loc) = self.location_of(s) {
                writeln!(f, "      at {loc}")?;
            }
            source = s.source();
            index += 1;
        }
        Ok(())
    }
}

impl<E> Report<E> {
    pub fn new(error: E) -> Self {
        Self {
            error,
            locators: vec![locate::<GenericError> as Locator],
        }
    }

    /// Also prints the location of errors of type `T` found in the chain.
    #[must_use]
    pub fn locate<T>(mut self) -> Self
    where
        T: Error + HasLocation + 'static,
    {
        self.locators.push(locate::<T>);
        self
    }

    fn location_of(&self, error: &(dyn Error + 'static)) -> Option<Location> {
        self.locators.iter().find_map(|locate| locate(error))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use alloc::string::ToString as _;

    use snafu::{FromString as _, ResultExt as _};

    use super::*;

    #[derive(Debug, Snafu)]
    enum ListError {
        #[snafu(display("block list is exhausted"))]
        Exhausted {
            #[snafu(implicit)]
            location: Location,
        },
    }

    impl HasLocation for ListError {
        fn location(&self) -> Location {
            match self {
                Self::Exhausted { location } => *location,
            }
        }
    }

    fn failing() -> Result<(), GenericError> {
        ExhaustedSnafu.fail::<()>().whatever_context("allocation failed")
    }

    fn source_location(err: &GenericError) -> Location {
        let source = err.source().unwrap();
        source.downcast_ref::<ListError>().unwrap().location()
    }

    #[test]
    fn test_report_without_source() {
        let err = GenericError::without_source("plain failure".into());
        let location = err.location();
        assert_eq!(
            Report::new(err).to_string(),
            std::format!("Error: plain failure\n  at {location}\n")
        );
    }

    #[test]
    fn test_report_skips_unknown_source_location() {
        let err = failing().unwrap_err();
        let location = err.location();
        assert_eq!(
            Report::new(err).to_string(),
            std::format!(
                "Error: allocation failed\n  at {location}\n\nCaused by:\n   0: block list is exhausted\n"
            )
        );
    }

    #[test]
    fn test_report_prints_located_source() {
        let err = failing().unwrap_err();
        let location = err.location();
        let source = source_location(&err);
        assert_eq!(
            Report::new(err).locate::<ListError>().to_string(),
            std::format!(
                "Error: allocation failed\n  at {location}\n\nCaused by:\n   0: block list is exhausted\n      at {source}\n"
            )
        );
    }

    #[test]
    fn test_location_points_at_caller() {
        let err = failing().unwrap_err();
        assert!(err.location().file().ends_with("lib.rs"));
        assert!(err.location().line() > 0);
        assert!(source_location(&err).file().ends_with("lib.rs"));
    }
}
