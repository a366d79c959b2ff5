/// A caller-chosen identifier attached to a registration. `Poll`/`Epoll`
/// hands it back on every event so the event can be mapped back to the
/// handle that produced it.
///
/// The selector uses the slab index of the owning `Channel` as the token,
/// so dispatch is a direct O(1) slab lookup rather than a further hash
/// lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub usize);

impl From<usize> for Token {
    #[inline]
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    #[inline]
    fn from(val: Token) -> usize {
        val.0
    }
}
