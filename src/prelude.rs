pub use crate::device::Platform as _;
pub use crate::driver::Registry as _;
pub use crate::io::RegisterIo as _;
pub use crate::mode::Mode as _;
pub use crate::walk::BufferView as _;
pub use crate::walk::BufferViewMut as _;
