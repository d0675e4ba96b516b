/// A peripheral reachable through `in`/`out`. A device claims a fixed set of
/// port numbers; the first attached device claiming a port serves it.
pub trait IoDevice {
    fn ports(&self) -> &[u32];
    fn on_input(&mut self, port: u32) -> u32;
    fn on_output(&mut self, port: u32, value: u32);
}
