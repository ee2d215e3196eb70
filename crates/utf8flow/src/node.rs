//! Push-based glue between pipeline stages.
//!
//! A [`Node`] wraps a [`Transform`] and forwards everything it produces to
//! the acceptors registered on its [`Output`], in registration order. A
//! flush drains the transform first, then fires the node's one-shot
//! `flushed` signal; downstream nodes subscribe to that signal to flush in
//! turn, so a flush is only observed after all data produced before it.
//!
//! Nodes are single-threaded. Shared ownership between stages goes through
//! [`NodeHandle`] (`Rc<RefCell<Node>>`); connecting a node's output back to
//! its own input is not supported and panics on the re-entrant borrow.

use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::{cell::RefCell, fmt};

/// A stateful stage: items in, zero or more items out.
pub trait Transform {
    type Input;
    type Output;

    /// Process one input item.
    fn push(&mut self, input: Self::Input, emit: &mut dyn FnMut(Self::Output));

    /// No more input will arrive; emit everything still buffered.
    fn flush(&mut self, emit: &mut dyn FnMut(Self::Output));
}

/// Downstream acceptors of a stage.
pub struct Output<T> {
    acceptors: Vec<Box<dyn FnMut(T)>>,
}

impl<T> Default for Output<T> {
    fn default() -> Self {
        Self {
            acceptors: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("acceptors", &self.acceptors.len())
            .finish()
    }
}

impl<T: Clone> Output<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, acceptor: impl FnMut(T) + 'static) {
        self.acceptors.push(Box::new(acceptor));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.acceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acceptors.is_empty()
    }

    /// Deliver `item` to every acceptor in registration order.
    pub fn emit(&mut self, item: T) {
        if let Some((last, rest)) = self.acceptors.split_last_mut() {
            for acceptor in rest {
                acceptor(item.clone());
            }
            last(item);
        }
    }
}

/// A multi-fire notification list.
pub struct Signal<T> {
    listeners: Vec<Box<dyn FnMut(&T)>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T> Signal<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn fire(&mut self, value: &T) {
        for listener in &mut self.listeners {
            listener(value);
        }
    }
}

/// A completion signal that fires at most once.
///
/// Listeners are retired when the signal fires. A listener subscribed after
/// that runs immediately.
#[derive(Default)]
pub struct OnceSignal {
    listeners: Vec<Box<dyn FnOnce()>>,
    fired: bool,
}

impl fmt::Debug for OnceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceSignal")
            .field("listeners", &self.listeners.len())
            .field("fired", &self.fired)
            .finish()
    }
}

impl OnceSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn subscribe(&mut self, listener: impl FnOnce() + 'static) {
        if self.fired {
            listener();
        } else {
            self.listeners.push(Box::new(listener));
        }
    }

    /// Run and retire all listeners. Returns `false` if already fired.
    pub fn fire(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        for listener in core::mem::take(&mut self.listeners) {
            listener();
        }
        true
    }
}

/// A [`Transform`] with its output fan-out and flush signal.
pub struct Node<T: Transform> {
    transform: T,
    output: Output<T::Output>,
    flushed: OnceSignal,
}

impl<T: Transform + fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("transform", &self.transform)
            .field("output", &self.output)
            .field("flushed", &self.flushed)
            .finish()
    }
}

impl<T> Node<T>
where
    T: Transform,
    T::Output: Clone,
{
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            output: Output::new(),
            flushed: OnceSignal::new(),
        }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn connect_output(&mut self, acceptor: impl FnMut(T::Output) + 'static) {
        self.output.connect(acceptor);
    }

    pub fn on_flushed(&mut self, listener: impl FnOnce() + 'static) {
        self.flushed.subscribe(listener);
    }

    #[must_use]
    pub fn is_flushed(&self) -> bool {
        self.flushed.has_fired()
    }

    pub fn input(&mut self, item: T::Input) {
        let output = &mut self.output;
        self.transform.push(item, &mut |out| output.emit(out));
    }

    /// Drain the transform, then fire the flushed signal (once).
    pub fn flush(&mut self) {
        let output = &mut self.output;
        self.transform.flush(&mut |out| output.emit(out));
        tracing::trace!(
            transform = core::any::type_name::<T>(),
            "node flushed"
        );
        self.flushed.fire();
    }
}

/// Shared handle to a [`Node`], used to wire stages together.
pub struct NodeHandle<T: Transform>(Rc<RefCell<Node<T>>>);

impl<T: Transform> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Transform + fmt::Debug> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeHandle").field(&self.0).finish()
    }
}

impl<T> NodeHandle<T>
where
    T: Transform + 'static,
    T::Output: Clone,
{
    pub fn new(transform: T) -> Self {
        Self(Rc::new(RefCell::new(Node::new(transform))))
    }

    /// An acceptor that pushes into this node's input.
    pub fn acceptor(&self) -> impl FnMut(T::Input) + use<T> {
        let node = self.clone();
        move |item| node.input(item)
    }

    /// A listener that flushes this node; subscribe it to an upstream
    /// completion signal.
    pub fn flusher(&self) -> impl FnOnce() + use<T> {
        let node = self.clone();
        move || node.flush()
    }

    pub fn input(&self, item: T::Input) {
        self.0.borrow_mut().input(item);
    }

    pub fn flush(&self) {
        self.0.borrow_mut().flush();
    }

    pub fn connect_output(&self, acceptor: impl FnMut(T::Output) + 'static) {
        self.0.borrow_mut().connect_output(acceptor);
    }

    pub fn on_flushed(&self, listener: impl FnOnce() + 'static) {
        self.0.borrow_mut().on_flushed(listener);
    }

    /// Forward this node's output into `downstream` and flush it once this
    /// node has flushed.
    pub fn pipe<U>(&self, downstream: &NodeHandle<U>)
    where
        U: Transform<Input = T::Output> + 'static,
        U::Output: Clone,
    {
        self.connect_output(downstream.acceptor());
        self.on_flushed(downstream.flusher());
    }

    #[must_use]
    pub fn is_flushed(&self) -> bool {
        self.0.borrow().is_flushed()
    }

    /// Run `f` with a shared borrow of the wrapped transform.
    pub fn with_transform<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.0.borrow().transform())
    }
}
