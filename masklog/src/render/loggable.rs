//! The `Loggable` capability and its implementations for standard types.
//!
//! ## Dispatch
//!
//! | Kind | Types | Rendering |
//! |------|-------|-----------|
//! | null | `Option::None`, `()` | `null` |
//! | scalar | numbers, `bool`, `char`, strings, `Duration` | `to_string()`, unmasked |
//! | sequence | slices, arrays, `Vec`, `VecDeque`, sets | `[a, b]` |
//! | map | `BTreeMap`, `HashMap` | `{k=v, k=v}` |
//! | record | types deriving `Loggable` | `Type{field=value}` |
//!
//! Wrappers (`&T`, `Box`, `Rc`, `Arc`, `Cow`, `RefCell`, `Mutex`, `RwLock`)
//! are transparent. Locks and cells are read without blocking: a value that
//! is currently borrowed or locked renders as `[INACCESSIBLE]`.
//!
//! ## Types without the capability
//!
//! Foreign types cannot implement `Loggable` directly (orphan rules). Wrap
//! them in [`DebugValue`] or [`DisplayValue`], or define a local newtype.

use std::{
    borrow::Cow,
    cell::RefCell,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    marker::PhantomData,
    rc::Rc,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use super::renderer::Renderer;
use crate::policy::RedactionPolicy;

/// A value that can describe itself to the rendering engine.
///
/// Derive it with `#[derive(Loggable)]` for structs and enums, or implement
/// it by hand:
///
/// ```rust
/// use masklog::{render, Loggable, MaskSpec, RedactionPolicy, Renderer};
///
/// struct Card {
///     holder: String,
///     number: String,
/// }
///
/// impl Loggable for Card {
///     fn describe(&self, out: &mut Renderer) {
///         out.record("Card")
///             .field("holder", &RedactionPolicy::None, &self.holder)
///             .field("number", &RedactionPolicy::Mask(MaskSpec::suffix(4)), &self.number);
///     }
/// }
///
/// let card = Card { holder: "Ada".into(), number: "4111111111111111".into() };
/// assert_eq!(render(&card), "Card{holder=Ada, number=************1111}");
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Loggable`",
    label = "this value cannot be rendered for logging",
    note = "use `#[derive(Loggable)]` on the type definition",
    note = "or wrap it in `DebugValue` / `DisplayValue` to render it through `Debug` / `Display`"
)]
pub trait Loggable {
    /// Writes this value into `out`.
    fn describe(&self, out: &mut Renderer);

    /// Returns `true` when the value is absent and renders as `null`.
    fn is_null(&self) -> bool {
        false
    }
}

/// Static per-field policies of a record type.
///
/// Generated by `#[derive(Loggable)]` for structs.
pub trait FieldPolicies {
    /// Field names paired with their policies, in declaration order.
    const FIELD_POLICIES: &'static [FieldPolicy];
}

/// One entry of [`FieldPolicies::FIELD_POLICIES`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldPolicy {
    pub name: &'static str,
    pub policy: RedactionPolicy,
}

impl FieldPolicy {
    pub const fn new(name: &'static str, policy: RedactionPolicy) -> Self {
        Self { name, policy }
    }
}

/// Looks up the policy of field `name` on `T`; unknown fields yield `None`.
pub fn field_policy<T: FieldPolicies + ?Sized>(name: &str) -> RedactionPolicy {
    T::FIELD_POLICIES
        .iter()
        .find(|field| field.name == name)
        .map_or(RedactionPolicy::None, |field| field.policy)
}

// =============================================================================
// Fallbacks for types without the capability
// =============================================================================

/// Renders the wrapped value through its `Debug` implementation, unmasked.
pub struct DebugValue<T>(pub T);

impl<T: fmt::Debug> Loggable for DebugValue<T> {
    fn describe(&self, out: &mut Renderer) {
        out.scalar(&format_args!("{:?}", self.0));
    }
}

/// Renders the wrapped value through its `Display` implementation, unmasked.
pub struct DisplayValue<T>(pub T);

impl<T: fmt::Display> Loggable for DisplayValue<T> {
    fn describe(&self, out: &mut Renderer) {
        out.scalar(&self.0);
    }
}

// =============================================================================
// Scalars
// =============================================================================

macro_rules! impl_loggable_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Loggable for $ty {
                fn describe(&self, out: &mut Renderer) {
                    out.scalar(&self);
                }
            }
        )*
    };
}

impl_loggable_scalar!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, str,
    String
);

impl Loggable for Duration {
    fn describe(&self, out: &mut Renderer) {
        out.scalar(&format_args!("{self:?}"));
    }
}

impl Loggable for () {
    fn describe(&self, out: &mut Renderer) {
        out.null();
    }

    fn is_null(&self) -> bool {
        true
    }
}

impl<T: ?Sized> Loggable for PhantomData<T> {
    fn describe(&self, out: &mut Renderer) {
        out.text("PhantomData");
    }
}

// =============================================================================
// Transparent wrappers
// =============================================================================

impl<T> Loggable for &T
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        (**self).describe(out);
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<T> Loggable for &mut T
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        (**self).describe(out);
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<T> Loggable for Box<T>
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        (**self).describe(out);
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<B> Loggable for Cow<'_, B>
where
    B: Loggable + ToOwned + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        (**self).describe(out);
    }
}

impl<T> Loggable for Option<T>
where
    T: Loggable,
{
    fn describe(&self, out: &mut Renderer) {
        match self {
            Some(value) => value.describe(out),
            None => out.null(),
        }
    }

    fn is_null(&self) -> bool {
        self.as_ref().map_or(true, Loggable::is_null)
    }
}

impl<T> Loggable for Rc<T>
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        out.shared(Rc::as_ptr(self).cast::<()>(), &&**self);
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<T> Loggable for Arc<T>
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        out.shared(Arc::as_ptr(self).cast::<()>(), &&**self);
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<T> Loggable for RefCell<T>
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        match self.try_borrow() {
            Ok(value) => value.describe(out),
            Err(_) => out.inaccessible(),
        }
    }
}

impl<T> Loggable for Mutex<T>
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        match self.try_lock() {
            Ok(value) => value.describe(out),
            Err(_) => out.inaccessible(),
        }
    }
}

impl<T> Loggable for RwLock<T>
where
    T: Loggable + ?Sized,
{
    fn describe(&self, out: &mut Renderer) {
        match self.try_read() {
            Ok(value) => value.describe(out),
            Err(_) => out.inaccessible(),
        }
    }
}

// =============================================================================
// Sequences and maps
// =============================================================================

impl<T: Loggable> Loggable for [T] {
    fn describe(&self, out: &mut Renderer) {
        out.seq(self);
    }
}

impl<T: Loggable, const N: usize> Loggable for [T; N] {
    fn describe(&self, out: &mut Renderer) {
        out.seq(self);
    }
}

impl<T: Loggable> Loggable for Vec<T> {
    fn describe(&self, out: &mut Renderer) {
        out.seq(self);
    }
}

impl<T: Loggable> Loggable for VecDeque<T> {
    fn describe(&self, out: &mut Renderer) {
        out.seq(self);
    }
}

impl<T: Loggable> Loggable for BTreeSet<T> {
    fn describe(&self, out: &mut Renderer) {
        out.seq(self);
    }
}

impl<T: Loggable, S> Loggable for HashSet<T, S> {
    fn describe(&self, out: &mut Renderer) {
        out.unordered_seq(self);
    }
}

impl<K: Loggable, V: Loggable> Loggable for BTreeMap<K, V> {
    fn describe(&self, out: &mut Renderer) {
        out.map(self);
    }
}

impl<K: Loggable, V: Loggable, S> Loggable for HashMap<K, V, S> {
    fn describe(&self, out: &mut Renderer) {
        out.unordered_map(self);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        borrow::Cow,
        cell::RefCell,
        collections::{BTreeMap, BTreeSet, HashMap, HashSet},
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::{field_policy, DebugValue, DisplayValue, FieldPolicies, FieldPolicy};
    use crate::{policy::RedactionPolicy, render::render};

    #[test]
    fn scalars_render_as_display() {
        assert_eq!(render(&42_i32), "42");
        assert_eq!(render(&-7_i64), "-7");
        assert_eq!(render(&1.5_f64), "1.5");
        assert_eq!(render(&true), "true");
        assert_eq!(render(&'x'), "x");
        assert_eq!(render(&"plain"), "plain");
        assert_eq!(render(&String::from("owned")), "owned");
        assert_eq!(render(&Cow::Borrowed("cow")), "cow");
    }

    #[test]
    fn empty_string_renders_as_itself() {
        assert_eq!(render(&String::new()), "");
    }

    #[test]
    fn absent_values_render_null() {
        assert_eq!(render(&None::<String>), "null");
        assert_eq!(render(&()), "null");
        assert_eq!(render(&Some(3_u8)), "3");
    }

    #[test]
    fn sequences_use_brackets() {
        assert_eq!(render(&vec![1, 2, 3]), "[1, 2, 3]");
        assert_eq!(render(&[true, false]), "[true, false]");
        assert_eq!(render(&Vec::<u8>::new()), "[]");
        assert_eq!(render(&BTreeSet::from(["b", "a"])), "[a, b]");
    }

    #[test]
    fn maps_use_key_equals_value() {
        let map = BTreeMap::from([("a", 1), ("b", 2)]);
        assert_eq!(render(&map), "{a=1, b=2}");
    }

    #[test]
    fn unordered_collections_render_deterministically() {
        let map: HashMap<&str, u8> = HashMap::from([("z", 1), ("a", 2), ("m", 3)]);
        assert_eq!(render(&map), "{a=2, m=3, z=1}");
        assert_eq!(render(&map), render(&map));

        let set: HashSet<u8> = HashSet::from([3, 1, 2]);
        assert_eq!(render(&set), "[1, 2, 3]");
    }

    #[test]
    fn nested_containers_recurse() {
        let value = vec![Some(vec!["a"]), None];
        assert_eq!(render(&value), "[[a], null]");
    }

    #[test]
    fn borrowed_cell_is_inaccessible() {
        let cell = RefCell::new(5_u8);
        assert_eq!(render(&cell), "5");
        let _guard = cell.borrow_mut();
        assert_eq!(render(&cell), "[INACCESSIBLE]");
    }

    #[test]
    fn locked_mutex_is_inaccessible() {
        let mutex = Arc::new(Mutex::new("value".to_string()));
        assert_eq!(render(&mutex), "value");
        let _guard = mutex.lock().unwrap();
        assert_eq!(render(&mutex), "[INACCESSIBLE]");
    }

    #[test]
    fn fallback_wrappers_use_std_formatting() {
        #[derive(Debug)]
        struct Foreign {
            id: u8,
        }
        assert_eq!(render(&DebugValue(Foreign { id: 1 })), "Foreign { id: 1 }");
        assert_eq!(render(&DisplayValue(std::net::Ipv4Addr::LOCALHOST)), "127.0.0.1");
        assert_eq!(render(&Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn field_policy_lookup_defaults_to_none() {
        struct Tagged;
        impl FieldPolicies for Tagged {
            const FIELD_POLICIES: &'static [FieldPolicy] =
                &[FieldPolicy::new("secret", RedactionPolicy::Exclude)];
        }

        assert_eq!(field_policy::<Tagged>("secret"), RedactionPolicy::Exclude);
        assert_eq!(field_policy::<Tagged>("other"), RedactionPolicy::None);
    }
}
