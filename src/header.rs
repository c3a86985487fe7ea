use bytes::Bytes;
use itertools::Itertools as _;

pub const CONTENT_TYPE: Bytes = Bytes::from_static(b"Content-Type");
pub const CONTENT_LENGTH: Bytes = Bytes::from_static(b"Content-Length");
pub const ALLOW: Bytes = Bytes::from_static(b"Allow");

/// Ordered collection of header fields.
///
/// Lookups ignore ASCII case, names are kept exactly as they were inserted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct HeaderMap(Vec<(Bytes, Bytes)>);

impl HeaderMap {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> + '_ {
        self.0.iter().map(|(name, value)| (name, value))
    }

    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&Bytes> {
        let key = key.as_ref();
        self.0
            .iter()
            .find_map(|(name, value)| name.matches(key).then_some(value))
    }

    /// Sets `name` to `value`, overwriting the value of a field with the exact same name in place.
    pub fn insert(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        let name = name.into();
        let value = value.into();

        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    /// Like [`HeaderMap::insert`], but an existing field matching `name` in any case is replaced
    /// in place and keeps its original spelling.
    pub fn replace(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        let name = name.into();
        let value = value.into();

        match self.0.iter_mut().find(|(k, _)| k.matches(&name)) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    /// Remove all fields matching `name` in any case.
    pub fn remove<K: AsRef<[u8]>>(&mut self, name: K) {
        let name = name.as_ref();
        self.0.retain(|(k, _)| !k.matches(name));
    }
}

impl std::fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self.0.iter().map(|(name, value)| {
            format!(
                "{}: {}",
                String::from_utf8_lossy(name),
                String::from_utf8_lossy(value)
            )
        });
        write!(f, "{{{}}}", fields.format(", "))
    }
}

impl FromIterator<(Bytes, Bytes)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (Bytes, Bytes)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

trait BytesExt {
    /// Returns `true` iff `self` matches given target ignoring casing of ASCII (alpha) characters
    fn matches(&self, target: impl AsRef<[u8]>) -> bool;
}

impl BytesExt for Bytes {
    #[inline]
    fn matches(&self, target: impl AsRef<[u8]>) -> bool {
        self.eq_ignore_ascii_case(target.as_ref())
    }
}
