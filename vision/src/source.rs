use opencv::core::Mat;

/// One acquired frame, with the label it is known to show when the source knows it.
pub struct Frame {
    pub image: Mat,
    pub label: Option<usize>,
}

impl Frame {
    pub fn new(image: Mat) -> Self {
        Self { image, label: None }
    }

    pub fn with_label(image: Mat, label: Option<usize>) -> Self {
        Self { image, label }
    }
}

pub trait FrameSource: Send {
    /// `None` once the stream has ended.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        (**self).next_frame()
    }
}
