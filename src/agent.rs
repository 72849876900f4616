//! Live walkers: a head, four limbs and four motorized joints in a private world.
//!
//! ```text
//!        +-----------------+
//!        |      head       |
//!        +--o-----------o--+      o = upper joints (hips)
//!           |           |
//!           |  upper    |
//!           o           o         o = lower joints (knees)
//!           |  lower    |
//!  =========+===========+========= ground (y = 0)
//! ```
//!
//! Every walker owns its [`PhysicsWorld`]; dropping the walker releases it.
//! Children never share a parent's world, they rebuild one from the parent's
//! lineage with [`Walker::from_lineage`].

use crate::chromosome::{Chromosome, Joint};
use crate::config::{
    FRICTION_COEFF, GRAVITY_Y, GROUND_HALF_EXTENTS, GROUND_Y, MAX_JOINT_ANGLE, MIN_JOINT_ANGLE,
    ShapeConfig, SimParams,
};
use crate::error::{Error, Result};
use crate::physics::{BodyDef, BoxShape, MotorJointDef, PhysicsWorld};
use crate::snapshot::{AgentSnapshot, Lineage, Vec2};
use rapier2d::prelude::{ImpulseJointHandle, RigidBodyHandle};

pub struct Walker {
    world: PhysicsWorld,
    shape: ShapeConfig,
    head: RigidBodyHandle,
    limbs: [RigidBodyHandle; Joint::COUNT],
    joints: [ImpulseJointHandle; Joint::COUNT],
    motor_speeds: Chromosome,
    lineage: Lineage,
}

impl Walker {
    /// Builds a standing walker at the rest layout with all motors idle and
    /// records snapshot 0.
    pub fn new(shape: ShapeConfig) -> Result<Self> {
        let mut world = ground_world();
        let layout = RestLayout::new(&shape);

        let head = spawn_head(&mut world, &shape, layout.head)?;
        let mut limbs = [head; Joint::COUNT];
        for joint in Joint::ALL {
            limbs[joint.index()] = spawn_limb(&mut world, &shape, joint, layout.limb(joint), 0.0)?;
        }
        let joints = build_joints(&mut world, &shape, head, &limbs)?;

        let mut walker = Self {
            world,
            shape,
            head,
            limbs,
            joints,
            motor_speeds: Chromosome::new([0.0; Joint::COUNT]),
            lineage: Vec::new(),
        };
        let first = walker.capture(0)?;
        walker.lineage.push(first);
        Ok(walker)
    }

    /// Rebuilds a walker in the exact kinematic state of the last snapshot of
    /// `lineage`, without re-simulating any of it.
    ///
    /// The rebuilt walker inherits a copy of `lineage` whose last entry is
    /// replaced by a snapshot of the rebuilt walker itself.
    pub fn from_lineage(lineage: &[AgentSnapshot]) -> Result<Self> {
        let current = lineage.last().ok_or_else(|| {
            Error::Configuration("cannot rebuild a walker from an empty lineage".into())
        })?;
        let shape = current.shape.clone();
        let mut world = ground_world();
        let layout = RestLayout::new(&shape);

        let head = spawn_head(&mut world, &shape, layout.head)?;
        let mut limbs = [head; Joint::COUNT];
        for joint in Joint::ALL {
            limbs[joint.index()] = spawn_limb(&mut world, &shape, joint, layout.limb(joint), 0.0)?;
        }
        world.set_transform(head, current.head_center, current.head_angle)?;

        // Angular velocity is fixed at body creation, so the limbs are rebuilt
        // with the velocities implied by the recorded joint speeds.
        let angular_velocities = limb_angular_velocities(&current.joint_speeds);
        for joint in Joint::ALL {
            let i = joint.index();
            world.destroy_body(limbs[i])?;
            limbs[i] = spawn_limb(&mut world, &shape, joint, layout.limb(joint), angular_velocities[i])?;
            world.set_transform(limbs[i], current.limb_centers[i], current.limb_angles[i])?;
        }

        let joints = build_joints(&mut world, &shape, head, &limbs)?;
        let mut walker = Self {
            world,
            shape,
            head,
            limbs,
            joints,
            motor_speeds: Chromosome::new([0.0; Joint::COUNT]),
            lineage: Vec::with_capacity(lineage.len() + 1),
        };
        walker.set_motor_speeds(&Chromosome::new(current.motor_setpoints))?;

        walker.lineage.extend_from_slice(&lineage[..lineage.len() - 1]);
        let rebuilt = walker.capture(current.index)?;
        walker.lineage.push(rebuilt);
        Ok(walker)
    }

    pub fn set_motor_speeds(&mut self, speeds: &Chromosome) -> Result<()> {
        for joint in Joint::ALL {
            self.world
                .set_motor_speed(self.joints[joint.index()], speeds[joint])?;
        }
        self.motor_speeds = *speeds;
        Ok(())
    }

    /// The motor targets last applied, i.e. this walker's chromosome.
    pub fn motor_speeds(&self) -> Chromosome {
        self.motor_speeds
    }

    pub fn shape(&self) -> &ShapeConfig {
        &self.shape
    }

    pub fn lineage(&self) -> &[AgentSnapshot] {
        &self.lineage
    }

    pub fn into_lineage(self) -> Lineage {
        self.lineage
    }

    /// Most recent snapshot. Every walker records one at construction.
    pub fn latest_snapshot(&self) -> Option<&AgentSnapshot> {
        self.lineage.last()
    }

    /// Head x of the most recent snapshot, measured from the world origin.
    /// NaN if no snapshot exists.
    pub fn fitness(&self) -> f32 {
        self.latest_snapshot()
            .map_or(f32::NAN, |snapshot| snapshot.head_center.x)
    }

    pub fn head_position(&self) -> Result<Vec2> {
        self.world.body_center(self.head)
    }

    pub fn head_velocity(&self) -> Result<Vec2> {
        self.world.body_linear_velocity(self.head)
    }

    /// Records the walker's current state without appending it.
    pub fn snapshot(&self) -> Result<AgentSnapshot> {
        self.capture(self.lineage.len())
    }

    /// Steps the world through one interval of `params`, then appends a
    /// snapshot. A non-finite state is a physics failure.
    pub fn advance(&mut self, params: &SimParams) -> Result<()> {
        let dt = params.timestep();
        for _ in 0..params.steps_per_interval() {
            self.world
                .step(dt, params.velocity_iterations, params.position_iterations)?;
        }
        let snapshot = self.snapshot()?;
        if !snapshot.is_finite() {
            return Err(Error::Physics(format!(
                "non-finite walker state after interval {}",
                snapshot.index
            )));
        }
        self.lineage.push(snapshot);
        Ok(())
    }

    fn capture(&self, index: usize) -> Result<AgentSnapshot> {
        let mut snapshot = AgentSnapshot {
            shape: self.shape.clone(),
            head_center: self.world.body_center(self.head)?,
            head_angle: self.world.body_angle(self.head)?,
            limb_centers: [Vec2::default(); Joint::COUNT],
            limb_angles: [0.0; Joint::COUNT],
            motor_setpoints: [0.0; Joint::COUNT],
            joint_speeds: [0.0; Joint::COUNT],
            joint_angles: [0.0; Joint::COUNT],
            index,
        };
        for joint in Joint::ALL {
            let i = joint.index();
            snapshot.limb_centers[i] = self.world.body_center(self.limbs[i])?;
            snapshot.limb_angles[i] = self.world.body_angle(self.limbs[i])?;
            snapshot.motor_setpoints[i] = self.world.motor_speed(self.joints[i])?;
            snapshot.joint_speeds[i] = self.world.joint_speed(self.joints[i])?;
            snapshot.joint_angles[i] = self.world.joint_angle(self.joints[i])?;
        }
        Ok(snapshot)
    }
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("motor_speeds", &self.motor_speeds)
            .field("fitness", &self.fitness())
            .field("lineage_len", &self.lineage.len())
            .finish()
    }
}

/// Absolute angular velocity of each limb given measured joint speeds.
///
/// A joint reports the angular velocity of its distal limb relative to its
/// proximal body, so velocities accumulate down each leg: an upper limb moves
/// at its hip speed (the head is taken to be non-rotating) and a lower limb
/// at its knee speed plus its upper limb's velocity.
pub fn limb_angular_velocities(joint_speeds: &[f32; Joint::COUNT]) -> [f32; Joint::COUNT] {
    let mut velocities = [0.0; Joint::COUNT];
    for joint in Joint::ALL {
        let proximal = joint.parent().map_or(0.0, |parent| velocities[parent.index()]);
        velocities[joint.index()] = joint_speeds[joint.index()] + proximal;
    }
    velocities
}

/// Body centers of a walker standing upright on the ground at x = 0.
#[derive(Clone, Copy, Debug)]
pub struct RestLayout {
    pub head: Vec2,
    limbs: [Vec2; Joint::COUNT],
}

impl RestLayout {
    pub fn new(shape: &ShapeConfig) -> Self {
        let head_h = shape.head_half_extents;
        let upper_h = shape.upper_limb_half_extents;
        let lower_h = shape.lower_limb_half_extents;
        let head = Vec2::new(
            0.0,
            GROUND_Y + head_h.y + 2.0 * upper_h.y + 2.0 * lower_h.y,
        );
        let limbs = Joint::ALL.map(|joint| {
            let x = head.x + joint.side().sign() * head_h.x / 2.0;
            let y = if joint.is_upper() {
                head.y - head_h.y - upper_h.y
            } else {
                head.y - head_h.y - 2.0 * upper_h.y - lower_h.y
            };
            Vec2::new(x, y)
        });
        Self { head, limbs }
    }

    pub fn limb(&self, joint: Joint) -> Vec2 {
        self.limbs[joint.index()]
    }
}

fn ground_world() -> PhysicsWorld {
    let mut world = PhysicsWorld::new(GRAVITY_Y);
    world.create_ground(GROUND_Y, GROUND_HALF_EXTENTS, FRICTION_COEFF);
    world
}

fn spawn_head(world: &mut PhysicsWorld, shape: &ShapeConfig, center: Vec2) -> Result<RigidBodyHandle> {
    let body = world.create_body(&BodyDef {
        center,
        ..BodyDef::default()
    });
    world.attach_box(
        body,
        &BoxShape {
            half_extents: shape.head_half_extents,
            density: shape.density,
            friction: FRICTION_COEFF,
        },
    )?;
    Ok(body)
}

fn spawn_limb(
    world: &mut PhysicsWorld,
    shape: &ShapeConfig,
    joint: Joint,
    center: Vec2,
    angular_velocity: f32,
) -> Result<RigidBodyHandle> {
    let body = world.create_body(&BodyDef {
        center,
        angle: 0.0,
        angular_velocity,
    });
    world.attach_box(
        body,
        &BoxShape {
            half_extents: limb_half_extents(shape, joint),
            density: shape.density,
            friction: FRICTION_COEFF,
        },
    )?;
    Ok(body)
}

fn limb_half_extents(shape: &ShapeConfig, joint: Joint) -> Vec2 {
    if joint.is_upper() {
        shape.upper_limb_half_extents
    } else {
        shape.lower_limb_half_extents
    }
}

/// Hips join the head's bottom edge to the top of each upper limb; knees join
/// the bottom of an upper limb to the top of the lower limb below it.
fn build_joints(
    world: &mut PhysicsWorld,
    shape: &ShapeConfig,
    head: RigidBodyHandle,
    limbs: &[RigidBodyHandle; Joint::COUNT],
) -> Result<[ImpulseJointHandle; Joint::COUNT]> {
    let mut handles = Vec::with_capacity(Joint::COUNT);
    for joint in Joint::ALL {
        let (proximal, anchor_a) = match joint.parent() {
            None => (
                head,
                Vec2::new(
                    joint.side().sign() * shape.head_half_extents.x / 2.0,
                    -shape.head_half_extents.y,
                ),
            ),
            Some(parent) => (
                limbs[parent.index()],
                Vec2::new(0.0, -shape.upper_limb_half_extents.y),
            ),
        };
        let def = MotorJointDef {
            anchor_a,
            anchor_b: Vec2::new(0.0, limb_half_extents(shape, joint).y),
            lower_angle: MIN_JOINT_ANGLE,
            upper_angle: MAX_JOINT_ANGLE,
            max_torque: shape.max_torque,
            motor_speed: 0.0,
        };
        handles.push(world.create_motor_joint(proximal, limbs[joint.index()], &def)?);
    }
    handles
        .try_into()
        .map_err(|_| Error::Physics("walker must have exactly four joints".into()))
}
