use super::{Accelerator, Opcode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub op: Opcode,
    pub arg0: u32,
    pub arg1: u32,
    pub ret: u32,
}

/// Forwards every command to `inner` and keeps a log of them.
#[derive(Debug, Default)]
pub struct Recorder<A> {
    pub inner: A,
    log: Vec<Command>,
}

impl<A: Accelerator> Recorder<A> {
    pub fn new(inner: A) -> Self { Self { inner, log: Vec::new() } }

    pub fn commands(&self) -> &[Command] { &self.log }

    pub fn count(&self, op: Opcode) -> usize { self.log.iter().filter(|c| c.op == op).count() }

    pub fn clear(&mut self) { self.log.clear(); }

    pub fn into_inner(self) -> A { self.inner }
}

impl<A: Accelerator> Accelerator for Recorder<A> {
    fn issue(&mut self, op: Opcode, arg0: u32, arg1: u32) -> u32 {
        let ret = self.inner.issue(op, arg0, arg1);
        self.log.push(Command { op, arg0, arg1, ret });
        ret
    }
}

/// Replaces the reply of the `fail_at`-th command (0-based) with `status`.
#[derive(Debug)]
pub struct FaultInjector<A> {
    pub inner: A,
    fail_at: usize,
    status: u32,
    issued: usize,
}

impl<A: Accelerator> FaultInjector<A> {
    pub fn new(inner: A, fail_at: usize, status: u32) -> Self { Self { inner, fail_at, status, issued: 0 } }

    pub fn issued(&self) -> usize { self.issued }
}

impl<A: Accelerator> Accelerator for FaultInjector<A> {
    fn issue(&mut self, op: Opcode, arg0: u32, arg1: u32) -> u32 {
        let ret = self.inner.issue(op, arg0, arg1);
        let n = self.issued;
        self.issued += 1;
        if n == self.fail_at { self.status } else { ret }
    }
}
