/// Runs a closure when dropped. Used to release descriptors on every exit
/// path of a strategy, including early returns through `?`.
pub struct Defer<F>
where
    F: FnMut(),
{
    f: F,
}

impl<F> Defer<F>
where
    F: FnMut(),
{
    pub fn new(f: F) -> Self {
        Defer { f }
    }
}

impl<F> Drop for Defer<F>
where
    F: FnMut(),
{
    fn drop(&mut self) {
        (self.f)();
    }
}
