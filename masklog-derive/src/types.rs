//! Type utilities for the derive macro.

/// Checks if a type is `PhantomData<..>` (bare or path-qualified).
///
/// Marker fields carry no data: records omit them and their type
/// parameters get no `Loggable` bound.
pub(crate) fn is_phantom_data(ty: &syn::Type) -> bool {
    let syn::Type::Path(path) = ty else {
        return false;
    };
    path.qself.is_none()
        && path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "PhantomData")
}
