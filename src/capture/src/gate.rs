use crate::frame::RawFrame;
use ipcsniff_common::process::ProcessRole;
use ipcsniff_common::target::CaptureFilter;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    PreExistingChannel,
    OutsideNamespace,
}

/// Applies the capture filter to each frame.
///
/// Both checks run on every frame independently: a channel that was not
/// open before the session can still carry frames the namespace filter
/// rejects, and vice versa.
#[derive(Debug, Clone)]
pub struct FrameGate {
    filter: CaptureFilter,
    pre_existing: HashSet<String>,
}

impl FrameGate {
    pub fn new(filter: CaptureFilter, pre_existing: HashSet<String>) -> Self {
        Self {
            filter,
            pre_existing,
        }
    }

    pub fn check(&self, frame: &RawFrame, role: Option<ProcessRole>) -> Verdict {
        if self.filter.only_new_channels && self.pre_existing.contains(&frame.channel) {
            return Verdict::PreExistingChannel;
        }
        if !self
            .filter
            .accepts_name(&frame.channel, role.map(|role| role.as_str()))
        {
            return Verdict::OutsideNamespace;
        }
        Verdict::Accept
    }
}
