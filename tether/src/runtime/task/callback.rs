use super::core::Runnable;
use crate::context::ExecutionContext;
use crate::failure::Failure;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

type BoxCallback = Box<dyn FnOnce() -> Result<(), Failure> + Send>;

/// A one-shot callback queued through [`ExecutionContext::execute`].
pub(crate) struct Callback {
    context: ExecutionContext,
    callback: Mutex<Option<BoxCallback>>,
}

impl Callback {
    pub(crate) fn new<F>(context: ExecutionContext, callback: F) -> Self
    where
        F: FnOnce() -> Result<(), Failure> + Send + 'static,
    {
        Self {
            context,
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }
}

impl Runnable for Callback {
    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn run(self: Arc<Self>) -> Result<(), Failure> {
        let Some(callback) = self.callback.lock().take() else {
            return Ok(());
        };

        panic::catch_unwind(AssertUnwindSafe(callback))
            .unwrap_or_else(|payload| Err(Failure::from_panic(payload)))
    }
}
