use super::{Type, TypeKind};
use crate::jvm::BaseType;
use std::collections::HashSet;

impl<'c> Type<'c> {
    /// Can a value of type `from` be stored in a variable of this type?
    ///
    /// This follows Java assignment rules:
    ///
    ///   - primitives only widen (`int` to `long` is fine, `long` to `int` isn't) and `boolean`
    ///     never converts
    ///   - `null` goes into any reference type
    ///   - classes are assignable to their superclasses and interfaces, transitively
    ///   - arrays are covariant in their reference component and are assignable to
    ///     `java.lang.Object`, `java.lang.Cloneable` and `java.io.Serializable`
    pub fn is_assignable_from(self, from: Type<'c>) -> bool {
        if self == from {
            return true;
        }
        match (&self.data.kind, &from.data.kind) {
            (TypeKind::Primitive(to), TypeKind::Primitive(from)) => widens_to(*from, *to),
            (TypeKind::Class { .. } | TypeKind::Array { .. }, TypeKind::Null) => true,
            (TypeKind::Class { .. }, TypeKind::Class { .. }) => from.has_supertype(self),
            (TypeKind::Class { .. }, TypeKind::Array { .. }) => {
                self.class_name().map_or(false, |name| {
                    from.interfaces()
                        .iter()
                        .chain(from.superclass().iter())
                        .any(|supertype| supertype.class_name() == Some(name))
                })
            }
            (TypeKind::Array { .. }, TypeKind::Array { .. }) => {
                match (self.component_type(), from.component_type()) {
                    (Some(to), Some(from)) if to.is_reference() && from.is_reference() => {
                        to.is_assignable_from(from)
                    }
                    (Some(to), Some(from)) => to == from,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Walk superclass and interface edges looking for `target`
    fn has_supertype(self, target: Type<'c>) -> bool {
        let mut to_visit: Vec<Type<'c>> = vec![self];
        let mut visited: HashSet<Type<'c>> = HashSet::new();
        visited.insert(self);

        // If the target is a class, interfaces can't lead to it
        let target_is_class = !target.is_interface();

        while let Some(current) = to_visit.pop() {
            if current == target {
                return true;
            }
            if let Some(superclass) = current.superclass() {
                if visited.insert(superclass) {
                    to_visit.push(superclass);
                }
            }
            if !target_is_class {
                for interface in current.interfaces() {
                    if visited.insert(interface) {
                        to_visit.push(interface);
                    }
                }
            }
        }
        false
    }

    /// Most specific type that both types are assignable to
    ///
    /// Returns `None` when there is no such type: a primitive against a reference, two primitives
    /// that don't widen into each other, or anything against `void`. Reference types always have
    /// a common supertype, since everything ends at `java.lang.Object`.
    ///
    /// When several interfaces would qualify, the result is `java.lang.Object`. This matches what
    /// the JVM verifier does with interfaces.
    pub fn common_supertype(self, other: Type<'c>) -> Option<Type<'c>> {
        if self == other {
            return Some(self);
        }
        if self.is_void() || other.is_void() {
            return None;
        }
        if self.is_null() && other.is_reference() {
            return Some(other);
        }
        if other.is_null() && self.is_reference() {
            return Some(self);
        }

        match (self.base_type(), other.base_type()) {
            (Some(first), Some(second)) => {
                return if widens_to(second, first) {
                    Some(self)
                } else if widens_to(first, second) {
                    Some(other)
                } else if is_int_promotable(first) && is_int_promotable(second) {
                    Some(self.context.int())
                } else {
                    None
                };
            }
            (Some(_), None) | (None, Some(_)) => return None,
            (None, None) => (),
        }

        if self.is_assignable_from(other) {
            return Some(self);
        }
        if other.is_assignable_from(self) {
            return Some(other);
        }

        let object = self.context.object();
        if let (Some(first), Some(second)) = (self.component_type(), other.component_type()) {
            if first.is_reference() && second.is_reference() {
                return first
                    .common_supertype(second)
                    .and_then(|component| self.context.array_of(component, 1).ok())
                    .or(Some(object));
            }
            return Some(object);
        }
        if self.is_interface() || other.is_interface() || self.is_array() || other.is_array() {
            return Some(object);
        }

        // Both are classes: find the first superclass of `other` that is also above `self`
        let mut ancestors: HashSet<Type<'c>> = HashSet::new();
        let mut current = Some(self);
        while let Some(class) = current {
            if !ancestors.insert(class) {
                break;
            }
            current = class.superclass();
        }
        let mut visited: HashSet<Type<'c>> = HashSet::new();
        let mut current = Some(other);
        while let Some(class) = current {
            if ancestors.contains(&class) {
                return Some(class);
            }
            if !visited.insert(class) {
                break;
            }
            current = class.superclass();
        }
        Some(object)
    }
}

/// Types that share `int` as a common supertype (`boolean` does not)
fn is_int_promotable(base_type: BaseType) -> bool {
    base_type.is_int_like() && base_type != BaseType::Boolean
}

/// Widening primitive conversions (plus the identity)
fn widens_to(from: BaseType, to: BaseType) -> bool {
    use BaseType::*;
    match (from, to) {
        _ if from == to => true,
        (Byte, Short | Int | Long | Float | Double) => true,
        (Short | Char, Int | Long | Float | Double) => true,
        (Int, Long | Float | Double) => true,
        (Long, Float | Double) => true,
        (Float, Double) => true,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::types::TypeContext;
    use crate::jvm::BinaryName;

    #[test]
    fn reflexive() {
        let context = TypeContext::new();
        for name in ["int", "boolean", "java.lang.Object", "java.lang.String[][]", "null"] {
            let typ = if name == "null" {
                context.null()
            } else {
                context.resolve(name).unwrap()
            };
            assert!(typ.is_assignable_from(typ), "{} <: {}", name, name);
        }
    }

    #[test]
    fn primitive_widening() {
        let context = TypeContext::new();
        let t = |name: &str| context.resolve(name).unwrap();

        assert!(t("long").is_assignable_from(t("int")));
        assert!(t("double").is_assignable_from(t("byte")));
        assert!(t("int").is_assignable_from(t("char")));
        assert!(!t("int").is_assignable_from(t("long")));
        assert!(!t("char").is_assignable_from(t("short")));
        assert!(!t("int").is_assignable_from(t("boolean")));
        assert!(!t("boolean").is_assignable_from(t("int")));
        assert!(!t("java.lang.Integer").is_assignable_from(t("int")));
    }

    #[test]
    fn classes_and_interfaces() {
        let context = TypeContext::new();
        let t = |name: &str| context.resolve(name).unwrap();

        assert!(t("java.lang.Object").is_assignable_from(t("java.lang.String")));
        assert!(t("java.lang.Number").is_assignable_from(t("java.lang.Integer")));
        assert!(t("java.lang.Object").is_assignable_from(t("java.lang.Integer")));
        assert!(!t("java.lang.Integer").is_assignable_from(t("java.lang.Number")));
        assert!(t("java.lang.CharSequence").is_assignable_from(t("java.lang.String")));
        assert!(!t("java.lang.String").is_assignable_from(t("java.lang.CharSequence")));
        assert!(t("java.io.Serializable").is_assignable_from(t("java.lang.Integer")));
        assert!(t("java.lang.String").is_assignable_from(context.null()));
        assert!(!t("int").is_assignable_from(context.null()));
    }

    #[test]
    fn transitive_through_declared_classes() {
        let context = TypeContext::new();
        let base = context
            .declare_class(
                &BinaryName::from_source_name("a.Base").unwrap(),
                context.resolve("java.lang.Exception").unwrap(),
                &[],
                false,
            )
            .unwrap();
        let derived = context
            .declare_class(
                &BinaryName::from_source_name("a.Derived").unwrap(),
                base,
                &[],
                false,
            )
            .unwrap();
        let throwable = context.resolve("java.lang.Throwable").unwrap();

        assert!(base.is_assignable_from(derived));
        assert!(throwable.is_assignable_from(base));
        assert!(throwable.is_assignable_from(derived));
        assert!(!derived.is_assignable_from(throwable));
    }

    #[test]
    fn arrays() {
        let context = TypeContext::new();
        let t = |name: &str| context.resolve(name).unwrap();

        assert!(t("java.lang.Object").is_assignable_from(t("int[]")));
        assert!(t("java.lang.Cloneable").is_assignable_from(t("int[]")));
        assert!(t("java.io.Serializable").is_assignable_from(t("java.lang.String[]")));
        assert!(!t("java.lang.String").is_assignable_from(t("char[]")));
        assert!(!t("long[]").is_assignable_from(t("int[]")));
        assert!(t("java.lang.Number[]").is_assignable_from(t("java.lang.Integer[]")));
        assert!(!t("java.lang.Integer[]").is_assignable_from(t("java.lang.Number[]")));
        assert!(t("java.lang.Object[]").is_assignable_from(t("int[][]")));
        assert!(!t("java.lang.Object[]").is_assignable_from(t("int[]")));
        assert!(t("java.lang.Number[][]").is_assignable_from(t("java.lang.Integer[][]")));
    }

    #[test]
    fn common_supertypes() {
        let context = TypeContext::new();
        let t = |name: &str| context.resolve(name).unwrap();

        assert_eq!(
            t("java.lang.Integer").common_supertype(t("java.lang.Long")),
            Some(t("java.lang.Number"))
        );
        assert_eq!(
            t("java.lang.String").common_supertype(t("java.lang.Integer")),
            Some(t("java.lang.Object"))
        );
        assert_eq!(
            context.null().common_supertype(t("java.lang.String")),
            Some(t("java.lang.String"))
        );
        assert_eq!(
            t("java.lang.Integer[]").common_supertype(t("java.lang.Double[]")),
            Some(t("java.lang.Number[]"))
        );
        assert_eq!(
            t("int[]").common_supertype(t("long[]")),
            Some(t("java.lang.Object"))
        );
        assert_eq!(t("short").common_supertype(t("long")), Some(t("long")));
        assert_eq!(t("short").common_supertype(t("char")), Some(t("int")));
        assert_eq!(t("boolean").common_supertype(t("int")), None);
        assert_eq!(t("int").common_supertype(t("java.lang.Integer")), None);
    }
}
