//! Macros for generating wrapped byte-vector types.

/// Implements a newtype wrapping `Vec<u8>` that serializes with a compact
/// int length prefix. Used for scripts and witness stack items, which the
/// signer treats as opaque bytes with no Script semantics.
macro_rules! wrap_prefixed_byte_vector {
    (
        $(#[$outer:meta])*
        $name:ident
    ) => {
        $(#[$outer])*
        #[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Instantiates a new wrapped vector from raw bytes.
            pub fn new(v: Vec<u8>) -> Self {
                Self(v)
            }

            /// The empty byte vector, serialized as a lone `0x00` length
            /// prefix.
            pub fn null() -> Self {
                Self(vec![])
            }

            /// The length of the underlying bytes, without the prefix.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True if the underlying vector is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// The underlying bytes, without the prefix.
            pub fn items(&self) -> &[u8] {
                &self.0
            }
        }

        impl sigstream_core::ser::ByteFormat for $name {
            type Error = sigstream_core::ser::SerError;

            fn serialized_length(&self) -> usize {
                sigstream_core::ser::compact_int_length(self.0.len() as u64) + self.0.len()
            }

            fn read_from<R: std::io::Read>(
                reader: &mut R,
            ) -> sigstream_core::ser::SerResult<Self> {
                let len = sigstream_core::ser::read_compact_int(reader)?;
                let mut v = vec![0u8; len as usize];
                reader.read_exact(&mut v)?;
                Ok(Self(v))
            }

            fn write_to<W: std::io::Write>(
                &self,
                writer: &mut W,
            ) -> sigstream_core::ser::SerResult<usize> {
                let len = sigstream_core::ser::write_compact_int(writer, self.0.len() as u64)?;
                writer.write_all(&self.0)?;
                Ok(len + self.0.len())
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(v: Vec<u8>) -> Self {
                Self(v)
            }
        }

        impl From<&[u8]> for $name {
            fn from(v: &[u8]) -> Self {
                Self(v.to_vec())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

/// Implements `From` conversions between two wrapped script types. The
/// conversion merely rewraps the underlying `Vec<u8>`.
macro_rules! impl_script_conversion {
    ($t1:ident, $t2:ident) => {
        impl From<&$t2> for $t1 {
            fn from(t: &$t2) -> $t1 {
                $t1::new(t.items().to_vec())
            }
        }
        impl From<&$t1> for $t2 {
            fn from(t: &$t1) -> $t2 {
                $t2::new(t.items().to_vec())
            }
        }
    };
}
