/// A value paired with a "new data" flag.
///
/// `store` sets the flag, `take` copies the value out and clears it. Callers
/// hold the port lock around both, so a reader never sees half a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fresh<T> {
    value: T,
    new: bool,
}

impl<T: Copy> Fresh<T> {
    pub const fn new(value: T) -> Self {
        Self { value, new: false }
    }

    pub fn store(&mut self, value: T) {
        self.value = value;
        self.new = true;
    }

    /// Copy the value and clear the flag.
    pub fn take(&mut self) -> T {
        self.new = false;
        self.value
    }

    /// Copy the value without touching the flag.
    pub fn peek(&self) -> T {
        self.value
    }

    pub fn is_new(&self) -> bool {
        self.new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_take_clears_flag() {
        let mut cell = Fresh::new(0i16);
        assert!(!cell.is_new());

        cell.store(5);
        assert!(cell.is_new());
        assert_eq!(cell.peek(), 5);
        assert!(cell.is_new());

        assert_eq!(cell.take(), 5);
        assert!(!cell.is_new());
        assert_eq!(cell.take(), 5);
    }
}
