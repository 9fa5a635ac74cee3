/// IPv4 time-to-live or IPv6 hop limit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ttl(pub u8);

impl Default for Ttl {
    fn default() -> Self {
        Ttl(64)
    }
}

impl From<u8> for Ttl {
    fn from(integer: u8) -> Self {
        Ttl(integer)
    }
}

impl From<Ttl> for u32 {
    fn from(ttl: Ttl) -> Self {
        u32::from(ttl.0)
    }
}

impl std::fmt::Display for Ttl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
