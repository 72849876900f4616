//! A single-owner rapier world exposing the handful of operations walkers need.

use crate::error::{Error, Result};
use crate::snapshot::Vec2;
use rapier2d::na::{Isometry2, Vector2, point, vector};
use rapier2d::prelude::*;
use std::f32::consts::{PI, TAU};
use std::num::NonZeroUsize;

/// Velocity gain of joint motors; high enough that the torque limit, not the
/// gain, bounds how fast a joint reaches its target speed.
const MOTOR_GAIN: f32 = 1.0e4;

/// Initial state of a dynamic body. Angular velocity can only be given here.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyDef {
    pub center: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
}

/// Box collider attached to a body, centered on it.
#[derive(Clone, Copy, Debug)]
pub struct BoxShape {
    pub half_extents: Vec2,
    pub density: f32,
    pub friction: f32,
}

/// Motorized revolute joint between `body_a` (proximal) and `body_b` (distal).
#[derive(Clone, Copy, Debug)]
pub struct MotorJointDef {
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub max_torque: f32,
    pub motor_speed: f32,
}

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

impl PhysicsWorld {
    pub fn new(gravity_y: f32) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, gravity_y],
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }

    /// Static box whose top face lies at `top_y`.
    pub fn create_ground(&mut self, top_y: f32, half_extents: Vec2, friction: f32) -> RigidBodyHandle {
        let ground = self.bodies.insert(
            RigidBodyBuilder::fixed()
                .translation(vector![0.0, top_y - half_extents.y])
                .build(),
        );
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y)
            .friction(friction)
            .build();
        self.colliders
            .insert_with_parent(collider, ground, &mut self.bodies);
        ground
    }

    pub fn create_body(&mut self, def: &BodyDef) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![def.center.x, def.center.y])
            .rotation(def.angle)
            .angvel(def.angular_velocity)
            .can_sleep(false)
            .build();
        self.bodies.insert(body)
    }

    pub fn attach_box(&mut self, body: RigidBodyHandle, shape: &BoxShape) -> Result<ColliderHandle> {
        if !self.bodies.contains(body) {
            return Err(missing("body", body));
        }
        let collider = ColliderBuilder::cuboid(shape.half_extents.x, shape.half_extents.y)
            .density(shape.density)
            .friction(shape.friction)
            .build();
        Ok(self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies))
    }

    pub fn create_motor_joint(
        &mut self,
        body_a: RigidBodyHandle,
        body_b: RigidBodyHandle,
        def: &MotorJointDef,
    ) -> Result<ImpulseJointHandle> {
        for body in [body_a, body_b] {
            if !self.bodies.contains(body) {
                return Err(missing("body", body));
            }
        }
        let mut joint = RevoluteJointBuilder::new()
            .local_anchor1(point![def.anchor_a.x, def.anchor_a.y])
            .local_anchor2(point![def.anchor_b.x, def.anchor_b.y]);
        // rapier limits must lie inside (-PI, PI); a range spanning a full
        // turn or more means free rotation.
        if def.upper_angle - def.lower_angle < TAU {
            joint = joint.limits([def.lower_angle.max(-PI), def.upper_angle.min(PI)]);
        }
        let joint = joint
            .motor_model(MotorModel::ForceBased)
            .motor_velocity(def.motor_speed, MOTOR_GAIN)
            .motor_max_force(def.max_torque)
            .contacts_enabled(false);
        Ok(self.impulse_joints.insert(body_a, body_b, joint, true))
    }

    pub fn set_motor_speed(&mut self, joint: ImpulseJointHandle, speed: f32) -> Result<()> {
        let joint_ref = self
            .impulse_joints
            .get_mut(joint, true)
            .ok_or_else(|| missing("joint", joint))?;
        joint_ref
            .data
            .set_motor_velocity(JointAxis::AngX, speed, MOTOR_GAIN);
        Ok(())
    }

    /// Target speed currently set on the joint's motor.
    pub fn motor_speed(&self, joint: ImpulseJointHandle) -> Result<f32> {
        let joint_ref = self.joint(joint)?;
        joint_ref
            .data
            .motor(JointAxis::AngX)
            .map(|motor| motor.target_vel)
            .ok_or_else(|| Error::Physics(format!("joint {joint:?} has no motor")))
    }

    /// Angular velocity of the distal body relative to the proximal body.
    pub fn joint_speed(&self, joint: ImpulseJointHandle) -> Result<f32> {
        let (a, b) = self.joint_bodies(joint)?;
        Ok(b.angvel() - a.angvel())
    }

    /// Angle of the distal body relative to the proximal body, wrapped to
    /// `[-PI, PI)`. Full turns are not accumulated, so a joint that has spun
    /// once reads the same as one that has not.
    pub fn joint_angle(&self, joint: ImpulseJointHandle) -> Result<f32> {
        let (a, b) = self.joint_bodies(joint)?;
        Ok(wrap_angle(b.rotation().angle() - a.rotation().angle()))
    }

    pub fn body_center(&self, body: RigidBodyHandle) -> Result<Vec2> {
        let t = self.body(body)?.translation();
        Ok(Vec2::new(t.x, t.y))
    }

    pub fn body_angle(&self, body: RigidBodyHandle) -> Result<f32> {
        Ok(self.body(body)?.rotation().angle())
    }

    pub fn body_linear_velocity(&self, body: RigidBodyHandle) -> Result<Vec2> {
        let v = self.body(body)?.linvel();
        Ok(Vec2::new(v.x, v.y))
    }

    pub fn body_angular_velocity(&self, body: RigidBodyHandle) -> Result<f32> {
        Ok(self.body(body)?.angvel())
    }

    /// Teleports a body, keeping its velocities.
    pub fn set_transform(&mut self, body: RigidBodyHandle, center: Vec2, angle: f32) -> Result<()> {
        let body_ref = self
            .bodies
            .get_mut(body)
            .ok_or_else(|| missing("body", body))?;
        body_ref.set_position(Isometry2::new(Vector2::new(center.x, center.y), angle), true);
        Ok(())
    }

    /// Removes a body together with its colliders and attached joints.
    pub fn destroy_body(&mut self, body: RigidBodyHandle) -> Result<()> {
        self.bodies
            .remove(
                body,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .map(|_| ())
            .ok_or_else(|| missing("body", body))
    }

    /// Zero velocity iterations is a physics error.
    pub fn step(
        &mut self,
        dt: f32,
        velocity_iterations: usize,
        position_iterations: usize,
    ) -> Result<()> {
        let solver_iterations = NonZeroUsize::new(velocity_iterations)
            .ok_or_else(|| Error::Physics("velocity iterations must be at least 1".into()))?;
        self.integration_parameters.dt = dt;
        self.integration_parameters.num_solver_iterations = solver_iterations;
        self.integration_parameters.num_internal_stabilization_iterations = position_iterations;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        Ok(())
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    fn body(&self, body: RigidBodyHandle) -> Result<&RigidBody> {
        self.bodies.get(body).ok_or_else(|| missing("body", body))
    }

    fn joint(&self, joint: ImpulseJointHandle) -> Result<&ImpulseJoint> {
        self.impulse_joints
            .get(joint)
            .ok_or_else(|| missing("joint", joint))
    }

    fn joint_bodies(&self, joint: ImpulseJointHandle) -> Result<(&RigidBody, &RigidBody)> {
        let joint_ref = self.joint(joint)?;
        Ok((self.body(joint_ref.body1)?, self.body(joint_ref.body2)?))
    }
}

fn missing(kind: &str, handle: impl std::fmt::Debug) -> Error {
    Error::Physics(format!("{kind} {handle:?} is not part of this world"))
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
