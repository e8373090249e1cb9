/// Scope functions to keep builder-like chains flowing.
pub trait LetAlso: Sized {
    /// Passes `self` by value into `f` and returns whatever `f` returns.
    fn let_owned<R, F>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }

    /// Passes a reference of `self` into `f` and returns `self` unchanged.
    fn also<F>(self, f: F) -> Self
    where
        F: FnOnce(&Self),
    {
        f(&self);
        self
    }
}

impl<T> LetAlso for T {}
