use std::fmt::Debug;
use tracing::{
  field::{Field, Visit},
  Event,
  Subscriber
};
use tracing_subscriber::{
  Layer,
  layer::Context,
  registry::LookupSpan
};

use super::get_global_verbosity;

/// A "layer" that causes the logging system to only emit messages at or below the global
/// verbosity. This baroque machinery is specific to the `tracing` crate.
pub(crate) struct VerbosityFilterLayer;

impl<S> Layer<S> for VerbosityFilterLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
  fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
    let mut visitor = VerbosityVisitor { verbosity: None };
    event.record(&mut visitor);

    match visitor.verbosity {
      Some(verbosity) => verbosity <= get_global_verbosity(),
      // No verbosity provided; treat as verbosity 0, i.e. emit the event.
      None => true
    }
  }
}

/// A "visitor" used for extracting the verbosity from log records. Used by
/// `VerbosityFilterLayer`; this is how the `tracing` crate does things.
struct VerbosityVisitor {
  verbosity: Option<u8>,
}

impl Visit for VerbosityVisitor {
  fn record_i64(&mut self, field: &Field, value: i64) {
    if field.name() == "verbosity" {
      if value >= 0 && value <= u8::MAX as i64 {
        self.verbosity = Some(value as u8);
      } else {
        panic!("Invalid verbosity value supplied to the logger: {:?} This is an error.", value);
      }
    }
  }

  fn record_u64(&mut self, field: &Field, value: u64) {
    if field.name() == "verbosity" {
      if value <= u8::MAX as u64 {
        self.verbosity = Some(value as u8);
      } else {
        panic!("Invalid verbosity value supplied to the logger: {:?} This is an error.", value);
      }
    }
  }

  fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
    if field.name() == "verbosity" {
      // This is an error.
      panic!("Invalid verbosity value supplied to the logger: {:?} This is an error.", value);
    }
  }
}
