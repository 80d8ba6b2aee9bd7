/*!

# Overview

The `log` module provides logging with a global numeric verbosity. Each message is logged _at_ a
verbosity, and only messages whose verbosity is at most the global verbosity are emitted. A message
logged at verbosity 0 is always emitted. The verbosity is orthogonal to the level (info, warning,
error, and so on); the level describes what _kind_ of message it is, the verbosity how chatty the
logger must be before the message appears.

```
use vmheap::log::*;

fn main() {
    set_global_verbosity(1);

    critical!(3, "A critical error occurred!"); // Not emitted
    error!(2, "This is an error message.");     // Not emitted
    warning!(2, "Check your input.");           // Not emitted
    info!(1, "Collection started.");            // Emitted
    debug!(0, "Free list is coherent.");        // Emitted
    trace!(0, "Stepping the work list.");       // Emitted
}
```

# Macros

`critical!`, `error!`, `warning!`, `info!`, `debug!`, `trace!`, each with syntax

```ignore
// With verbosity
level!(verbosity, "format string", args...);

// Without verbosity (verbosity of 0, always emitted)
level!("format string", args...);
```

The macros initialize the logging machinery implicitly on first use; no explicit setup call is
required. The global verbosity is an atomic, so it may be adjusted at any time from any thread.

*/
mod formatter;
mod verbosity_filter;
mod macros;

use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::Lazy;
use tracing_subscriber::{
  fmt,
  layer::SubscriberExt,
  Registry
};

use verbosity_filter::VerbosityFilterLayer;
use formatter::CustomFieldFormatter;
pub use macros::*;

/// Used for implicit initialization.
static INIT_LOGGER: Lazy<()> = Lazy::new(|| {
  let subscriber = Registry::default()
      .with(VerbosityFilterLayer)
      .with(
        fmt::layer()
            .fmt_fields(CustomFieldFormatter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stdout),
      );

  tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
});

/// This does not need to be called directly. Initializes the logging system.
pub fn init_logger() {
  Lazy::force(&INIT_LOGGER);
}

static GLOBAL_VERBOSITY: AtomicU8 = AtomicU8::new(3); // Default verbosity

/// Sets the global verbosity. Messages logged at a higher verbosity are suppressed.
pub fn set_global_verbosity(new_verbosity: u8) {
  GLOBAL_VERBOSITY.store(new_verbosity, Ordering::SeqCst);
}

/// Retrieves the global verbosity.
pub fn get_global_verbosity() -> u8 {
  GLOBAL_VERBOSITY.load(Ordering::SeqCst)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_logging() {
    let reclaimed = 42;

    set_global_verbosity(3);

    // Logged: verbosity 2 <= global verbosity 3
    info!(2, "Reclaimed blocks: {}", reclaimed);

    // NOT logged: verbosity 4 > global verbosity 3
    debug!(4, "NOT logged: {:?}", reclaimed);

    // Logged: default verbosity of 0
    warning!("An unexpected condition occurred.");

    // NOT logged
    error!(5, "NOT logged: {}", reclaimed);

    // Logged
    critical!(1, "Critical failure: {}", reclaimed);

    set_global_verbosity(5);

    // Logged now that the global verbosity is 5
    info!(5, "This message is logged after raising the verbosity.");
  }
}
