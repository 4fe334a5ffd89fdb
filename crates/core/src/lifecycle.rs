/// Sentinel events marking producer lifecycle boundaries.
///
/// These are not data items: they carry no payload and no acknowledgment
/// obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The delivery stream has been materialized and will start issuing
    /// items as soon as credit is granted.
    StreamInit,
    /// The delivery stream has ended; no further items will arrive.
    StreamFinished,
}
