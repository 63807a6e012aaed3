//! Native callbacks reachable through code fields.
//!
//! A code field holds a callback id. Ids below [`CoreCallback::COUNT`] name
//! the built-in callbacks listed here; the ids after that index into the
//! host-supplied `&'static [NativeEntry<T>]` table in order.
//!
//! Every callback finishes by calling [`Engine::next`] itself. A callback
//! that returns without doing so (`halt`) leaves nothing pending and the
//! dispatch loop stops.

use crate::{Engine, Error, Word};

mod control;
mod floats;
mod heap;
mod memory;
mod pattern;
mod stack;

pub use self::floats::format_g;
pub(crate) use self::{heap::Heap, pattern::Patterns};

pub type Callback<T> = fn(&mut Engine<T>) -> Result<(), Error>;

/// A host-provided native word.
pub struct NativeEntry<T: 'static> {
    pub name: &'static str,
    pub func: Callback<T>,
}

/// Shorthand for building a [`NativeEntry`] in a `static` table.
///
/// ```rust
/// use yulark::{native, Engine, Error, NativeEntry, Word};
///
/// fn triple(engine: &mut Engine<()>) -> Result<(), Error> {
///     let n = engine.pop()?.as_i64();
///     engine.push(Word::data(n * 3))?;
///     engine.next()
/// }
///
/// static HOST: &[NativeEntry<()>] = &[native!("3*", triple)];
/// assert_eq!(HOST[0].name, "3*");
/// ```
#[macro_export]
macro_rules! native {
    ($name:literal, $func:expr) => {
        $crate::NativeEntry {
            name: $name,
            func: $func,
        }
    };
}

impl<T: 'static> Clone for NativeEntry<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for NativeEntry<T> {}

impl<T: 'static> core::fmt::Debug for NativeEntry<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NativeEntry").field("name", &self.name).finish()
    }
}

macro_rules! core_callbacks {
    (
        continuations { $($cvariant:ident = $cname:literal => $cfunc:path,)+ }
        words { $($variant:ident = $name:literal => $func:path,)+ }
    ) => {
        /// The built-in callbacks, in id order.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum CoreCallback {
            $($cvariant,)+
            $($variant,)+
        }

        impl CoreCallback {
            pub const ALL: &'static [CoreCallback] = &[
                $(CoreCallback::$cvariant,)+
                $(CoreCallback::$variant,)+
            ];
            pub const COUNT: usize = Self::ALL.len();

            pub const fn name(self) -> &'static str {
                match self {
                    $(CoreCallback::$cvariant => $cname,)+
                    $(CoreCallback::$variant => $name,)+
                }
            }

            /// Continuations are only ever stored in code fields. They have
            /// no dictionary entry of their own.
            pub const fn is_continuation(self) -> bool {
                match self {
                    $(CoreCallback::$cvariant => true,)+
                    _ => false,
                }
            }

            pub(crate) fn func<T: 'static>(self) -> Callback<T> {
                match self {
                    $(CoreCallback::$cvariant => $cfunc,)+
                    $(CoreCallback::$variant => $func,)+
                }
            }
        }
    };
}

core_callbacks! {
    continuations {
        Docol = "docol" => Engine::docol,
        Dovar = "dovar" => Engine::dovar,
        Doconst = "doconst" => Engine::doconst,
    }
    words {
        Exit = "exit" => Engine::exit,
        Halt = "halt" => Engine::halt,
        Literal = "(literal)" => Engine::literal,
        Branch = "(branch)" => Engine::branch,
        ZeroBranch = "(0branch)" => Engine::branch_if_zero,
        Execute = "execute" => Engine::execute,
        Noop = "noop" => Engine::noop,

        Dup = "dup" => Engine::dup,
        Drop = "drop" => Engine::discard,
        Swap = "swap" => Engine::swap,
        Over = "over" => Engine::over,
        Rot = "rot" => Engine::rot,
        ToR = ">r" => Engine::data_to_return_stack,
        RFrom = "r>" => Engine::return_to_data_stack,
        RFetch = "r@" => Engine::return_peek,
        Depth = "depth" => Engine::depth,

        Add = "+" => Engine::add,
        Sub = "-" => Engine::sub,
        Mul = "*" => Engine::mul,
        Div = "/" => Engine::div,
        Mod = "mod" => Engine::modu,
        Negate = "negate" => Engine::negate,
        OnePlus = "1+" => Engine::incr,
        OneMinus = "1-" => Engine::decr,
        TwoStar = "2*" => Engine::twice,
        Equal = "=" => Engine::equal,
        Less = "<" => Engine::less,
        Greater = ">" => Engine::greater,
        ZeroEqual = "0=" => Engine::zero_equal,
        And = "and" => Engine::and,
        Or = "or" => Engine::or,
        Xor = "xor" => Engine::xor,
        Invert = "invert" => Engine::invert,

        Fetch = "@" => Engine::fetch,
        Store = "!" => Engine::store,
        ByteFetch = "c@" => Engine::byte_fetch,
        ByteStore = "c!" => Engine::byte_store,
        Here = "here" => Engine::push_here,
        Comma = "," => Engine::comma,
        Allot = "allot" => Engine::allot,
        Cells = "cells" => Engine::cells,

        Emit = "emit" => Engine::emit,
        Dot = "." => Engine::pop_print,
        Cr = "cr" => Engine::cr,
        Type = "type" => Engine::type_bytes,

        FAdd = "f+" => Engine::float_add,
        FSub = "f-" => Engine::float_sub,
        FMul = "f*" => Engine::float_mul,
        FDiv = "f/" => Engine::float_div,
        FNegate = "fnegate" => Engine::float_negate,
        FAbs = "fabs" => Engine::float_abs,
        FMin = "fmin" => Engine::float_min,
        FMax = "fmax" => Engine::float_max,
        IntToFloat = "s>f" => Engine::int_to_float,
        FloatToInt = "f>s" => Engine::float_to_int,
        FDot = "f." => Engine::float_pop_print,

        XAlloc = "xalloc" => Engine::xalloc,
        XFree = "xfree" => Engine::xfree,
        PtrFetch = "p@" => Engine::ptr_fetch,
        PtrStore = "p!" => Engine::ptr_store,
        PtrByteFetch = "pc@" => Engine::ptr_byte_fetch,
        PtrByteStore = "pc!" => Engine::ptr_byte_store,

        ReCompile = "re-compile" => Engine::re_compile,
        ReExec = "re-exec" => Engine::re_exec,
        ReFree = "re-free" => Engine::re_free,
    }
}

impl CoreCallback {
    #[inline]
    pub fn from_id(id: u64) -> Option<Self> {
        let idx = usize::try_from(id).ok()?;
        Self::ALL.get(idx).copied()
    }

    #[inline]
    pub fn id(self) -> Word {
        Word::uint(self as u64)
    }

    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|cb| cb.name() == name)
    }
}

/// Id of the `idx`th host native.
#[inline]
pub fn host_id(idx: usize) -> Word {
    Word::cell(CoreCallback::COUNT + idx)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_table_positions() {
        for (i, cb) in CoreCallback::ALL.iter().enumerate() {
            assert_eq!(*cb as usize, i);
            assert_eq!(CoreCallback::from_id(i as u64), Some(*cb));
        }
        assert_eq!(CoreCallback::from_id(CoreCallback::COUNT as u64), None);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = CoreCallback::ALL.iter().map(|cb| cb.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CoreCallback::COUNT);
    }

    #[test]
    fn continuations_come_first() {
        let n = CoreCallback::ALL
            .iter()
            .take_while(|cb| cb.is_continuation())
            .count();
        assert_eq!(n, 3);
        assert!(!CoreCallback::ALL[n..].iter().any(|cb| cb.is_continuation()));
        assert_eq!(CoreCallback::by_name("exit"), Some(CoreCallback::Exit));
        assert_eq!(host_id(0), Word::cell(CoreCallback::COUNT));
    }
}
