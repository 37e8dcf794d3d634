//! Neon particle background: a fixed-period physics loop over a retained shape layer.

use crate::scheduler::{Scheduler, TimerHandle};
use eframe::egui;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Duration;

pub const NEON_COLORS: [egui::Color32; 5] = [
    egui::Color32::from_rgb(0x00, 0xf5, 0xff),
    egui::Color32::from_rgb(0xff, 0x00, 0xe6),
    egui::Color32::from_rgb(0x4d, 0xff, 0x6e),
    egui::Color32::from_rgb(0xff, 0x9a, 0x00),
    egui::Color32::from_rgb(0x7a, 0x5c, 0xff),
];

pub const MIN_PARTICLES: usize = 5;
pub const MAX_PARTICLES: usize = 150;
pub const DEFAULT_PARTICLES: usize = 40;
pub const MIN_SIZE: u32 = 6;
pub const MAX_SIZE: u32 = 50;
pub const TICK_PERIOD: Duration = Duration::from_millis(35);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Oval {
    min: egui::Pos2,
    size: f32,
    color: egui::Color32,
}

/// Retained drawing surface: shapes live until deleted and are repainted every frame.
#[derive(Debug, Default)]
pub struct ShapeLayer {
    shapes: BTreeMap<ShapeId, Oval>,
    next_id: u64,
}

impl ShapeLayer {
    /// New shapes start invisible until placed.
    pub fn create(&mut self, size: u32) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        let oval = Oval { min: egui::Pos2::ZERO, size: size as f32, color: egui::Color32::TRANSPARENT };
        self.shapes.insert(id, oval);
        id
    }

    pub fn place(&mut self, id: ShapeId, x: f32, y: f32, size: u32, color: egui::Color32) {
        if let Some(oval) = self.shapes.get_mut(&id) {
            *oval = Oval { min: egui::pos2(x, y), size: size as f32, color };
        }
    }

    pub fn delete(&mut self, id: ShapeId) -> bool {
        self.shapes.remove(&id).is_some()
    }

    #[cfg(test)]
    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Paints every oval (inscribed in its bounding box) offset by `origin`.
    pub fn paint(&self, painter: &egui::Painter, origin: egui::Pos2) {
        for oval in self.shapes.values() {
            let radius = oval.size / 2.0;
            let center = origin + oval.min.to_vec2() + egui::vec2(radius, radius);
            painter.circle_filled(center, radius, oval.color.gamma_multiply(0.55));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub size: u32,
    pub color: egui::Color32,
    pub shape: ShapeId,
}

pub struct ParticleField<R = StdRng> {
    particles: Vec<Particle>,
    desired_count: usize,
    width: f32,
    height: f32,
    layer: ShapeLayer,
    rng: R,
}

impl ParticleField<StdRng> {
    pub fn new(count: usize) -> Self {
        Self::with_rng(count, StdRng::from_os_rng())
    }
}

impl<R: Rng> ParticleField<R> {
    /// Starts unlaid-out (1x1) with `count` particles at the origin, unclamped like the
    /// initial population of the window; later changes go through [`Self::set_count`].
    pub fn with_rng(count: usize, rng: R) -> Self {
        let mut field = Self {
            particles: Vec::with_capacity(count),
            desired_count: count,
            width: 1.0,
            height: 1.0,
            layer: ShapeLayer::default(),
            rng,
        };
        for _ in 0..count {
            let particle = field.spawn();
            field.particles.push(particle);
        }
        field
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn desired_count(&self) -> usize {
        self.desired_count
    }

    #[cfg(test)]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn layer(&self) -> &ShapeLayer {
        &self.layer
    }

    #[cfg(test)]
    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Scatters every particle across the new bounds. Ignored until laid out.
    pub fn resize(&mut self, width: f32, height: f32) {
        if width <= 1.0 || height <= 1.0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.scatter();
    }

    /// Scatters at the current bounds and re-applies the desired count.
    pub fn reseed(&mut self) {
        if self.width > 1.0 && self.height > 1.0 {
            self.scatter();
        }
        self.set_count(self.desired_count);
    }

    pub fn tick(&mut self) {
        let (width, height) = (self.width, self.height);
        for p in &mut self.particles {
            p.x += p.dx;
            p.y += p.dy;

            if p.x <= 0.0 {
                p.x = 0.0;
                p.dx = p.dx.abs();
            } else if p.x >= width {
                p.x = width;
                p.dx = -p.dx.abs();
            }

            if p.y >= height {
                p.y = -(p.size as f32);
                p.x = self.rng.random_range(0.0..=width);
            }
            self.layer.place(p.shape, p.x, p.y, p.size, p.color);
        }
    }

    /// Grows or shrinks to `count` clamped to the allowed range, in one step.
    /// Returns how many shapes were released.
    pub fn set_count(&mut self, count: usize) -> usize {
        let count = count.clamp(MIN_PARTICLES, MAX_PARTICLES);
        self.desired_count = count;

        while self.particles.len() < count {
            let mut particle = self.spawn();
            particle.x = self.random_x();
            particle.y = self.random_y();
            self.layer.place(particle.shape, particle.x, particle.y, particle.size, particle.color);
            self.particles.push(particle);
        }

        let mut released = 0;
        while self.particles.len() > count {
            if let Some(particle) = self.particles.pop() {
                if self.layer.delete(particle.shape) {
                    released += 1;
                }
            }
        }
        if released > 0 {
            log::debug!("Released {released} particles, {} remain", self.particles.len());
        }
        released
    }

    fn spawn(&mut self) -> Particle {
        let size = self.rng.random_range(MIN_SIZE..=MAX_SIZE);
        let color = NEON_COLORS[self.rng.random_range(0..NEON_COLORS.len())];
        Particle {
            x: 0.0,
            y: 0.0,
            dx: self.rng.random_range(-1.5..=1.5),
            dy: self.rng.random_range(0.3..=1.6),
            size,
            color,
            shape: self.layer.create(size),
        }
    }

    fn scatter(&mut self) {
        for i in 0..self.particles.len() {
            let x = self.random_x();
            let y = self.random_y();
            let p = &mut self.particles[i];
            p.x = x;
            p.y = y;
            self.layer.place(p.shape, p.x, p.y, p.size, p.color);
        }
    }

    fn random_x(&mut self) -> f32 {
        self.rng.random_range(0..=self.width as u32) as f32
    }

    fn random_y(&mut self) -> f32 {
        self.rng.random_range(0..=self.height as u32) as f32
    }
}

/// Implemented by the UI state that owns the particle background.
pub trait Animated: Sized + 'static {
    fn scene(&mut self) -> &mut ParticleScene;
}

/// A particle field plus the timer that drives it.
pub struct ParticleScene {
    pub field: ParticleField,
    period: Duration,
    pending: Option<TimerHandle>,
    ticks: u64,
}

impl ParticleScene {
    pub fn new(field: ParticleField) -> Self {
        Self { field, period: TICK_PERIOD, pending: None, ticks: 0 }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn start<S: Animated>(&mut self, sched: &mut Scheduler<S>) {
        if self.pending.is_some() {
            return;
        }
        log::debug!("Particle animation started");
        self.pending = Some(schedule_tick(sched, self.period));
    }

    pub fn stop<S>(&mut self, sched: &mut Scheduler<S>) {
        if let Some(handle) = self.pending.take() {
            sched.cancel(handle);
            log::debug!("Particle animation stopped after {} ticks", self.ticks);
        }
    }
}

fn schedule_tick<S: Animated>(sched: &mut Scheduler<S>, period: Duration) -> TimerHandle {
    sched.schedule_after(period, |state: &mut S, sched| {
        let scene = state.scene();
        if scene.pending.is_none() {
            return;
        }
        scene.field.tick();
        scene.ticks += 1;
        scene.pending = Some(schedule_tick(sched, scene.period));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    fn field(count: usize) -> ParticleField<StdRng> {
        ParticleField::with_rng(count, StdRng::seed_from_u64(7))
    }

    #[test]
    fn new_particles_use_configured_ranges() {
        let f = field(150);
        for p in f.particles() {
            assert!((MIN_SIZE..=MAX_SIZE).contains(&p.size));
            assert!((-1.5..=1.5).contains(&p.dx));
            assert!((0.3..=1.6).contains(&p.dy));
            assert!(NEON_COLORS.contains(&p.color));
        }
    }

    #[test]
    fn set_count_holds_exactly_n_within_range() {
        let mut f = field(40);
        for n in [5, 6, 39, 40, 41, 100, 150] {
            f.set_count(n);
            assert_eq!(f.len(), n);
            assert_eq!(f.layer().len(), n);
        }
    }

    #[test]
    fn set_count_clamps_out_of_range_values() {
        let mut f = field(40);
        f.set_count(0);
        assert_eq!(f.len(), MIN_PARTICLES);
        f.set_count(1_000);
        assert_eq!(f.len(), MAX_PARTICLES);
        assert_eq!(f.desired_count(), MAX_PARTICLES);
    }

    #[test]
    fn set_count_is_idempotent() {
        let mut f = field(40);
        f.resize(800.0, 600.0);
        f.set_count(25);
        let before = f.particles().to_vec();
        assert_eq!(f.set_count(25), 0);
        assert_eq!(f.particles(), before.as_slice());
    }

    #[test]
    fn shrinking_releases_handles_from_the_end() {
        let mut f = field(40);
        f.resize(800.0, 600.0);
        let kept: Vec<ShapeId> = f.particles()[..10].iter().map(|p| p.shape).collect();
        let dropped: Vec<ShapeId> = f.particles()[10..].iter().map(|p| p.shape).collect();

        assert_eq!(f.set_count(10), 30);
        assert_eq!(f.len(), 10);
        assert_eq!(f.layer().len(), 10);
        assert!(kept.iter().all(|id| f.layer().contains(*id)));
        assert!(dropped.iter().all(|id| !f.layer().contains(*id)));
    }

    #[test]
    fn growing_places_new_particles_inside_bounds() {
        let mut f = field(5);
        f.resize(300.0, 200.0);
        f.set_count(60);
        for p in &f.particles()[5..] {
            assert!((0.0..=300.0).contains(&p.x));
            assert!((0.0..=200.0).contains(&p.y));
        }
    }

    #[test]
    fn resize_ignores_unlaid_out_viewport() {
        let mut f = field(20);
        f.resize(640.0, 480.0);
        let before = f.particles().to_vec();
        f.resize(1.0, 480.0);
        f.resize(640.0, 0.0);
        assert_eq!(f.particles(), before.as_slice());
        assert_eq!(f.bounds(), (640.0, 480.0));
    }

    #[test]
    fn resize_scatters_into_new_bounds() {
        let mut f = field(50);
        f.resize(120.0, 90.0);
        for p in f.particles() {
            assert!((0.0..=120.0).contains(&p.x));
            assert!((0.0..=90.0).contains(&p.y));
        }
    }

    #[test]
    fn ticks_keep_particles_in_bounds() {
        let mut f = field(150);
        f.resize(200.0, 150.0);
        let max_size = MAX_SIZE as f32;
        for _ in 0..2_000 {
            f.tick();
            for p in f.particles() {
                assert!((0.0..=200.0).contains(&p.x), "x out of bounds: {}", p.x);
                assert!(p.y >= -max_size && p.y <= 150.0, "y out of bounds: {}", p.y);
            }
        }
    }

    #[test]
    fn particle_at_right_edge_bounces() {
        let mut f = field(5);
        f.resize(100.0, 100.0);
        f.set_count(5);
        {
            let p = &mut f.particles[0];
            p.x = 100.0;
            p.y = 10.0;
            p.dx = 1.0;
        }
        f.tick();
        let p = &f.particles()[0];
        assert_eq!(p.dx, -1.0);
        assert_eq!(p.x, 100.0);
    }

    #[test]
    fn particle_leaving_bottom_wraps_to_top() {
        let mut f = field(5);
        f.resize(100.0, 100.0);
        let (size, color, dx, dy) = {
            let p = &mut f.particles[0];
            p.x = 50.0;
            p.y = 99.9;
            p.dx = 0.5;
            (p.size, p.color, p.dx, p.dy)
        };
        f.tick();
        let p = &f.particles()[0];
        assert_eq!(p.y, -(size as f32));
        assert!((0.0..=100.0).contains(&p.x));
        assert_eq!((p.size, p.color, p.dx, p.dy), (size, color, dx, dy));
    }

    struct Host {
        scene: ParticleScene,
    }

    impl Animated for Host {
        fn scene(&mut self) -> &mut ParticleScene {
            &mut self.scene
        }
    }

    #[test]
    fn animation_ticks_on_period_until_stopped() {
        let t0 = Instant::now();
        let mut sched = Scheduler::<Host>::starting_at(t0);
        let mut host = Host { scene: ParticleScene::new(ParticleField::new(10)) };
        host.scene.field.resize(400.0, 300.0);

        host.scene.start(&mut sched);
        host.scene.start(&mut sched);
        assert_eq!(sched.pending(), 1);

        for i in 1..=4u32 {
            sched.pump(&mut host, t0 + TICK_PERIOD * i);
        }
        assert_eq!(host.scene.ticks(), 4);

        host.scene.stop(&mut sched);
        assert!(!host.scene.is_running());
        assert_eq!(sched.pending(), 0);
        sched.pump(&mut host, t0 + TICK_PERIOD * 10);
        assert_eq!(host.scene.ticks(), 4);
    }
}
