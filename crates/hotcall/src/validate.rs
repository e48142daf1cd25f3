//! Call-shape validation.
//!
//! Checks a descriptor against a requested shape before any plan is built.
//! The checks run in a fixed order and the first failure wins:
//!
//! 1. descriptor belongs to this registry and has the right kind
//! 2. arity (supported range, then equality with the declared parameters)
//! 3. value-producing shapes need a non-void member
//! 4. effect shapes need a void member
//! 5. static/instance agreement
//! 6. pinned receiver must derive from the declaring type
//! 7. pinned result must accept the member's value type
//! 8. field and property accessors must exist and be visible
//!
//! Deriving a typed shape can itself fail with `UnknownHostType`; the engine
//! runs check 1 before that, so a bad descriptor is always reported first.

use hotcall_meta::{MemberDescriptor, MemberImpl, MemberKind, TypeRegistry, Visibility};

use crate::error::{AccessorHalf, CompileResult, ContractError};
use crate::shape::{Arity, CallShape, Family, Output, Receiver, MAX_ARITY};

/// `Type.member` for methods, fields and properties; `new Type` for constructors.
pub(crate) fn member_path(types: &TypeRegistry, member: &MemberDescriptor) -> String {
    let owner = types.name_of(member.declaring);
    match member.kind {
        MemberKind::Constructor => format!("new {owner}"),
        _ => format!("{owner}.{}", member.name),
    }
}

fn expected_kinds(family: Family) -> &'static [MemberKind] {
    match family {
        Family::Constructor => &[MemberKind::Constructor],
        Family::Method => &[MemberKind::Method],
        Family::Getter | Family::Setter => &[MemberKind::Field, MemberKind::Property],
    }
}

/// Step 1 on its own. Typed shapes resolve their host types against the
/// registry, so the engine runs this before deriving the shape.
pub(crate) fn check_descriptor(
    types: &TypeRegistry,
    member: &MemberDescriptor,
    family: Family,
) -> CompileResult<()> {
    if member.registry != types.id() {
        return Err(ContractError::InvalidArgument {
            name: "descriptor",
            reason: "descriptor belongs to a different type registry".to_string(),
        });
    }
    if !expected_kinds(family).contains(&member.kind) {
        return Err(ContractError::InvalidArgument {
            name: "descriptor",
            reason: format!(
                "expected a {} but `{}` is a {}",
                describe_family(family),
                member_path(types, member),
                member.kind
            ),
        });
    }
    Ok(())
}

pub fn validate(
    types: &TypeRegistry,
    member: &MemberDescriptor,
    shape: &CallShape,
) -> CompileResult<()> {
    let family = shape.family();

    // 1. Descriptor presence and kind.
    check_descriptor(types, member, family)?;

    // 2. Arity. Field and property accessors have no parameter list.
    if matches!(family, Family::Constructor | Family::Method) {
        if let Arity::Fixed(arity) = shape.arity {
            if arity > MAX_ARITY {
                return Err(ContractError::UnsupportedArity {
                    arity,
                    max: MAX_ARITY,
                });
            }
            if arity != member.arity() {
                return Err(ContractError::ArityMismatch {
                    member: member_path(types, member),
                    expected: member.arity(),
                    actual: arity,
                });
            }
        }
    }

    // 3 and 4. Value-producing versus effect-only.
    if family == Family::Method {
        if shape.is_value_producing() && !member.is_value_producing() {
            return Err(ContractError::NotValueProducing {
                member: member_path(types, member),
            });
        }
        if !shape.is_value_producing() && member.is_value_producing() {
            return Err(ContractError::NotEffectOnly {
                member: member_path(types, member),
                value_ty: types.name_of(member.value_ty),
            });
        }
    }

    // 5. Static versus instance.
    match shape.receiver {
        Receiver::Opaque | Receiver::Pinned(_) if member.is_static => {
            return Err(ContractError::StaticMemberRejected {
                member: member_path(types, member),
            });
        }
        Receiver::Static if !member.is_static && member.kind != MemberKind::Constructor => {
            return Err(ContractError::ReceiverRequired {
                member: member_path(types, member),
            });
        }
        _ => {}
    }

    // 6. The pinned receiver must be the declaring type or derive from it.
    if let Receiver::Pinned(receiver) = shape.receiver {
        if !types.is_assignable(receiver, member.declaring) {
            return Err(ContractError::ReceiverTypeMismatch {
                declaring: types.name_of(member.declaring),
                receiver: types.name_of(receiver),
            });
        }
    }

    // 7. The pinned result must accept the member's value type, and a pinned
    // setter value must fit the member.
    if let Output::Pinned(result) = shape.output {
        if !types.is_assignable(member.value_ty, result) {
            return Err(ContractError::ResultTypeMismatch {
                value_ty: types.name_of(member.value_ty),
                result: types.name_of(result),
            });
        }
    }
    if let Some(assigned) = shape.assigned {
        if !types.is_assignable(assigned, member.value_ty) {
            return Err(ContractError::ValueTypeMismatch {
                value_ty: types.name_of(member.value_ty),
                assigned: types.name_of(assigned),
            });
        }
    }

    // 8. Accessor existence and visibility.
    let half = match family {
        Family::Getter => AccessorHalf::Get,
        Family::Setter => AccessorHalf::Set,
        _ => return Ok(()),
    };
    let visibility = accessor_visibility(member, half).ok_or_else(|| {
        ContractError::AccessorMissing {
            member: member_path(types, member),
            half,
        }
    })?;
    if visibility != Visibility::Public && !shape.allow_non_public {
        return Err(ContractError::AccessorNotPublic {
            member: member_path(types, member),
            half,
        });
    }
    Ok(())
}

/// Visibility of one half of a field or property, or `None` if that half
/// does not exist.
fn accessor_visibility(member: &MemberDescriptor, half: AccessorHalf) -> Option<Visibility> {
    match (&member.imp, half) {
        (MemberImpl::Slot { .. }, AccessorHalf::Get) => Some(member.visibility),
        (MemberImpl::Slot { read_only, .. }, AccessorHalf::Set) => {
            (!read_only).then_some(member.visibility)
        }
        (MemberImpl::Property { getter, .. }, AccessorHalf::Get) => {
            getter.as_ref().map(|g| g.visibility)
        }
        (MemberImpl::Property { setter, .. }, AccessorHalf::Set) => {
            setter.as_ref().map(|s| s.visibility)
        }
        (MemberImpl::Native(_), _) => None,
    }
}

fn describe_family(family: Family) -> &'static str {
    match family {
        Family::Constructor => "constructor",
        Family::Method => "method",
        Family::Getter | Family::Setter => "field or property",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotcall_meta::{FieldDef, MethodDef, PropertyAccessorDef, PropertyDef, TyId, Value};

    hotcall_meta::host_class!(struct Shape => "Shape");
    hotcall_meta::host_class!(struct Circle => "Circle");
    hotcall_meta::host_class!(struct Other => "Other");

    struct Fixture {
        types: TypeRegistry,
        area: MemberDescriptor,
        reset: MemberDescriptor,
        unit: MemberDescriptor,
        radius: MemberDescriptor,
        secret: MemberDescriptor,
        frozen: MemberDescriptor,
        label: MemberDescriptor,
    }

    fn fixture() -> Fixture {
        let mut types = TypeRegistry::new();
        let shape = types.define_class("Shape", None, &[]).unwrap();
        let circle = types.define_class("Circle", Some(shape), &[]).unwrap();
        types.define_class("Other", None, &[]).unwrap();
        let radius = types.field(circle, "radius", TyId::FLOAT).unwrap();
        let secret = types
            .field_with(
                circle,
                "secret",
                TyId::INT,
                FieldDef {
                    visibility: Visibility::NonPublic,
                    read_only: false,
                },
            )
            .unwrap();
        let frozen = types
            .field_with(
                circle,
                "frozen",
                TyId::INT,
                FieldDef {
                    visibility: Visibility::Public,
                    read_only: true,
                },
            )
            .unwrap();
        let area = types
            .method(shape, "area", &[TyId::INT, TyId::INT, TyId::INT], TyId::FLOAT, |_, _| {
                Ok(Value::Float(0.0))
            })
            .unwrap();
        let reset = types
            .method(shape, "reset", &[], TyId::VOID, |_, _| Ok(Value::Null))
            .unwrap();
        let unit = types
            .method_with(
                shape,
                "unit",
                MethodDef {
                    is_static: true,
                    ..MethodDef::new(&[], shape)
                },
                hotcall_meta::native_fn(|_, _| Ok(Value::Null)),
            )
            .unwrap();
        let label = types
            .property(
                circle,
                "label",
                TyId::STRING,
                PropertyDef {
                    getter: Some(PropertyAccessorDef::public(|_, _| Ok(Value::from("c")))),
                    setter: None,
                    is_static: false,
                },
            )
            .unwrap();
        Fixture {
            types,
            area,
            reset,
            unit,
            radius,
            secret,
            frozen,
            label,
        }
    }

    struct A;

    #[test]
    fn arity_mismatch_before_invocation() {
        let f = fixture();
        let shape = CallShape::method::<A, Value, Value>(&f.types, 2).unwrap();
        let err = validate(&f.types, &f.area, &shape).unwrap_err();
        assert_eq!(
            err,
            ContractError::ArityMismatch {
                member: "Shape.area".to_string(),
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn arity_above_limit() {
        let f = fixture();
        let shape = CallShape::method::<A, Value, Value>(&f.types, 10).unwrap();
        assert!(matches!(
            validate(&f.types, &f.area, &shape),
            Err(ContractError::UnsupportedArity { arity: 10, max: 9 })
        ));
    }

    #[test]
    fn void_method_rejected_by_value_shape() {
        let f = fixture();
        let shape = CallShape::method::<A, Value, Value>(&f.types, 0).unwrap();
        assert!(matches!(
            validate(&f.types, &f.reset, &shape),
            Err(ContractError::NotValueProducing { .. })
        ));
    }

    #[test]
    fn value_method_rejected_by_effect_shape() {
        let f = fixture();
        let shape = CallShape::action::<A, Value>(&f.types, 3).unwrap();
        assert!(matches!(
            validate(&f.types, &f.area, &shape),
            Err(ContractError::NotEffectOnly { value_ty, .. }) if value_ty == "Float"
        ));
    }

    #[test]
    fn static_member_rejected_by_instance_shape() {
        let f = fixture();
        let shape = CallShape::method::<A, Value, Value>(&f.types, 0).unwrap();
        assert!(matches!(
            validate(&f.types, &f.unit, &shape),
            Err(ContractError::StaticMemberRejected { .. })
        ));
    }

    #[test]
    fn instance_member_rejected_by_static_shape() {
        let f = fixture();
        let shape = CallShape::static_method::<A, Value>(&f.types, 3).unwrap();
        assert!(matches!(
            validate(&f.types, &f.area, &shape),
            Err(ContractError::ReceiverRequired { .. })
        ));
    }

    #[test]
    fn pinned_receiver_must_derive_from_declaring_type() {
        let f = fixture();
        let derived = CallShape::method::<A, Circle, Value>(&f.types, 3).unwrap();
        assert!(validate(&f.types, &f.area, &derived).is_ok());

        let unrelated = CallShape::method::<A, Other, Value>(&f.types, 3).unwrap();
        assert_eq!(
            validate(&f.types, &f.area, &unrelated),
            Err(ContractError::ReceiverTypeMismatch {
                declaring: "Shape".to_string(),
                receiver: "Other".to_string(),
            })
        );
    }

    #[test]
    fn pinned_result_must_accept_value_type() {
        let f = fixture();
        let widened = CallShape::method::<A, Shape, hotcall_meta::ObjectRef>(&f.types, 3).unwrap();
        assert!(validate(&f.types, &f.area, &widened).is_ok());

        let narrowed = CallShape::method::<A, Shape, i64>(&f.types, 3).unwrap();
        assert!(matches!(
            validate(&f.types, &f.area, &narrowed),
            Err(ContractError::ResultTypeMismatch { .. })
        ));
    }

    #[test]
    fn wrong_kind_is_an_invalid_argument() {
        let f = fixture();
        let shape = CallShape::method::<A, Value, Value>(&f.types, 0).unwrap();
        assert!(matches!(
            validate(&f.types, &f.radius, &shape),
            Err(ContractError::InvalidArgument { name: "descriptor", .. })
        ));
    }

    #[test]
    fn foreign_descriptor_is_an_invalid_argument() {
        let f = fixture();
        let other = TypeRegistry::new();
        let shape = CallShape::getter::<A, Value, Value>(&other).unwrap();
        assert!(matches!(
            validate(&other, &f.radius, &shape),
            Err(ContractError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn field_visibility_and_writability() {
        let f = fixture();
        let get = CallShape::getter::<A, Value, Value>(&f.types).unwrap();
        let set = CallShape::setter::<A, Value, Value>(&f.types).unwrap();

        assert!(validate(&f.types, &f.radius, &get).is_ok());
        assert!(validate(&f.types, &f.radius, &set).is_ok());
        assert!(matches!(
            validate(&f.types, &f.secret, &get),
            Err(ContractError::AccessorNotPublic { half: AccessorHalf::Get, .. })
        ));
        assert!(validate(&f.types, &f.secret, &get.with_non_public(true)).is_ok());
        assert!(matches!(
            validate(&f.types, &f.frozen, &set),
            Err(ContractError::AccessorMissing { half: AccessorHalf::Set, .. })
        ));
    }

    #[test]
    fn property_without_setter() {
        let f = fixture();
        let get = CallShape::getter::<A, Circle, String>(&f.types).unwrap();
        assert!(validate(&f.types, &f.label, &get).is_ok());

        let set = CallShape::setter::<A, Circle, String>(&f.types).unwrap();
        assert_eq!(
            validate(&f.types, &f.label, &set),
            Err(ContractError::AccessorMissing {
                member: "Circle.label".to_string(),
                half: AccessorHalf::Set,
            })
        );
    }

    #[test]
    fn pinned_assigned_value_must_fit() {
        let f = fixture();
        let set = CallShape::setter::<A, Value, bool>(&f.types).unwrap();
        assert!(matches!(
            validate(&f.types, &f.radius, &set),
            Err(ContractError::ValueTypeMismatch { .. })
        ));
    }

    #[test]
    fn arity_is_checked_before_static_ness() {
        let f = fixture();
        let shape = CallShape::method::<A, Value, Value>(&f.types, 1).unwrap();
        assert!(matches!(
            validate(&f.types, &f.unit, &shape),
            Err(ContractError::ArityMismatch { .. })
        ));
    }
}
