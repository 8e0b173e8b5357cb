//! Capability components
//!
//! A closed set of component kinds stored per entity. Queries go through
//! [`ComponentVariant`], so call sites read like
//! `entity.components.get::<MeshComponent>()`.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::instancing::InstanceBinding;
use crate::scene::components::{
    AnimationComponent, JointComponent, LightComponent, MeshComponent, SceneComponent,
    TransformComponent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    Mesh,
    Light,
    Animation,
    Joint,
    Scene,
}

impl ComponentKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Transform => "Transform",
            Self::Mesh => "Mesh",
            Self::Light => "Light",
            Self::Animation => "Animation",
            Self::Joint => "Joint",
            Self::Scene => "Scene",
        }
    }

    #[must_use]
    pub fn mask(self) -> ComponentMask {
        match self {
            Self::Transform => ComponentMask::TRANSFORM,
            Self::Mesh => ComponentMask::MESH,
            Self::Light => ComponentMask::LIGHT,
            Self::Animation => ComponentMask::ANIMATION,
            Self::Joint => ComponentMask::JOINT,
            Self::Scene => ComponentMask::SCENE,
        }
    }
}

bitflags! {
    /// Set of component kinds present on an entity.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ComponentMask: u8 {
        const TRANSFORM = 1 << 0;
        const MESH      = 1 << 1;
        const LIGHT     = 1 << 2;
        const ANIMATION = 1 << 3;
        const JOINT     = 1 << 4;
        const SCENE     = 1 << 5;

        /// Kinds that may own an instance slot.
        const INSTANCED = Self::MESH.bits() | Self::LIGHT.bits() | Self::JOINT.bits();
    }
}

#[derive(Debug, Clone)]
pub enum Component {
    Transform(TransformComponent),
    Mesh(MeshComponent),
    Light(LightComponent),
    Animation(AnimationComponent),
    Joint(JointComponent),
    Scene(SceneComponent),
}

impl Component {
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Transform(_) => ComponentKind::Transform,
            Self::Mesh(_) => ComponentKind::Mesh,
            Self::Light(_) => ComponentKind::Light,
            Self::Animation(_) => ComponentKind::Animation,
            Self::Joint(_) => ComponentKind::Joint,
            Self::Scene(_) => ComponentKind::Scene,
        }
    }
}

/// Maps a payload type to its [`Component`] variant.
pub trait ComponentVariant: Sized {
    const KIND: ComponentKind;

    fn into_component(self) -> Component;
    fn from_component(component: &Component) -> Option<&Self>;
    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
}

macro_rules! impl_component_variant {
    ($ty:ty, $variant:ident) => {
        impl ComponentVariant for $ty {
            const KIND: ComponentKind = ComponentKind::$variant;

            #[inline]
            fn into_component(self) -> Component {
                Component::$variant(self)
            }

            #[inline]
            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$variant(c) => Some(c),
                    _ => None,
                }
            }

            #[inline]
            fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$variant(c) => Some(c),
                    _ => None,
                }
            }
        }
    };
}

impl_component_variant!(TransformComponent, Transform);
impl_component_variant!(MeshComponent, Mesh);
impl_component_variant!(LightComponent, Light);
impl_component_variant!(AnimationComponent, Animation);
impl_component_variant!(JointComponent, Joint);
impl_component_variant!(SceneComponent, Scene);

/// Per-entity component store, at most one component per kind.
#[derive(Debug, Clone, Default)]
pub struct Components {
    slots: SmallVec<[Component; 4]>,
    mask: ComponentMask,
}

impl Components {
    #[inline]
    #[must_use]
    pub fn has<C: ComponentVariant>(&self) -> bool {
        self.has_kind(C::KIND)
    }

    #[must_use]
    pub fn has_kind(&self, kind: ComponentKind) -> bool {
        self.mask.contains(kind.mask())
    }

    #[inline]
    #[must_use]
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    #[must_use]
    pub fn get<C: ComponentVariant>(&self) -> Option<&C> {
        self.slots.iter().find_map(C::from_component)
    }

    pub fn get_mut<C: ComponentVariant>(&mut self) -> Option<&mut C> {
        self.slots.iter_mut().find_map(C::from_component_mut)
    }

    /// Inserts or replaces the component of this kind, returning the old one.
    pub fn insert<C: ComponentVariant>(&mut self, component: C) -> Option<Component> {
        let new = component.into_component();
        self.mask.insert(C::KIND.mask());
        if let Some(slot) = self.slots.iter_mut().find(|c| c.kind() == C::KIND) {
            Some(std::mem::replace(slot, new))
        } else {
            self.slots.push(new);
            None
        }
    }

    pub fn remove<C: ComponentVariant>(&mut self) -> Option<Component> {
        let pos = self.slots.iter().position(|c| c.kind() == C::KIND)?;
        self.mask.remove(C::KIND.mask());
        Some(self.slots.remove(pos))
    }

    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.slots.iter().map(Component::kind)
    }

    /// Instance binding held by the component of `kind`, if that kind owns one.
    #[must_use]
    pub fn instance_binding(&self, kind: ComponentKind) -> Option<&InstanceBinding> {
        match kind {
            ComponentKind::Mesh => self.get::<MeshComponent>().map(|c| &c.instance),
            ComponentKind::Light => self.get::<LightComponent>()?.instance.as_ref(),
            ComponentKind::Joint => self.get::<JointComponent>()?.instance.as_ref(),
            _ => None,
        }
    }

    pub fn instance_binding_mut(&mut self, kind: ComponentKind) -> Option<&mut InstanceBinding> {
        match kind {
            ComponentKind::Mesh => self.get_mut::<MeshComponent>().map(|c| &mut c.instance),
            ComponentKind::Light => self.get_mut::<LightComponent>()?.instance.as_mut(),
            ComponentKind::Joint => self.get_mut::<JointComponent>()?.instance.as_mut(),
            _ => None,
        }
    }
}
