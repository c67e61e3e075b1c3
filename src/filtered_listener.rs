use crate::event::SeekerEvent;
use crate::eventbus::EventListener;

/// Wraps a listener and forwards only events matching a predicate.
pub struct FilteredListener {
    predicate: Box<dyn Fn(&SeekerEvent) -> bool + Send + Sync>,
    inner: Box<dyn EventListener>,
}

impl FilteredListener {
    pub fn new(
        predicate: impl Fn(&SeekerEvent) -> bool + Send + Sync + 'static,
        inner: impl EventListener + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner: Box::new(inner),
        }
    }
}

impl EventListener for FilteredListener {
    fn on_event(&mut self, event: &SeekerEvent) {
        if (self.predicate)(event) {
            self.inner.on_event(event);
        }
    }
}
