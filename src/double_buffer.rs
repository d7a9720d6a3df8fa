/// A read/write pair whose roles flip on [`DoubleBuffered::swap`].
#[derive(Clone, Debug, PartialEq)]
pub struct DoubleBuffered<T> {
    buffers: [T; 2],
    read: usize,
}

impl<T> DoubleBuffered<T> {
    pub fn new(read: T, write: T) -> Self {
        Self {
            buffers: [read, write],
            read: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.buffers[self.read]
    }

    pub fn write(&self) -> &T {
        &self.buffers[1 - self.read]
    }

    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffers.iter()
    }
}
