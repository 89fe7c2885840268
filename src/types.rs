#[derive(Debug, Clone, Copy, Default)]
pub struct RunMode {
    pub simulate: bool,
    pub debug: bool,
}
