//! Math helpers layered on top of `glam`: inertia tensors, the skew-symmetric
//! cross-product matrix, and a small symmetric eigen solver used to extract
//! principal inertia axes.

use glam::{Mat3, Quat, Vec3};

/// Converts an angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular / angular.length();
    Quat::from_axis_angle(axis, angle)
}

/// Skew-symmetric matrix `S(v)` such that `S(v) * w == v.cross(w)`.
pub fn skew(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Diagonal inertia of a solid box with the given half extents.
pub fn inertia_box(half_extents: Vec3, mass: f32) -> Vec3 {
    let size = half_extents * 2.0;
    let factor = mass / 12.0;
    Vec3::new(
        factor * (size.y * size.y + size.z * size.z),
        factor * (size.x * size.x + size.z * size.z),
        factor * (size.x * size.x + size.y * size.y),
    )
}

/// Diagonal inertia of a solid sphere.
pub fn inertia_sphere(radius: f32, mass: f32) -> Vec3 {
    Vec3::splat(0.4 * mass * radius * radius)
}

/// Diagonal inertia of a solid cylinder aligned along Y.
pub fn inertia_cylinder(radius: f32, half_height: f32, mass: f32) -> Vec3 {
    let height = 2.0 * half_height;
    let lateral = (1.0 / 12.0) * mass * (3.0 * radius * radius + height * height);
    Vec3::new(lateral, 0.5 * mass * radius * radius, lateral)
}

/// Diagonal inertia of a solid capsule aligned along Y, split into a
/// cylinder plus two hemispherical caps by volume.
pub fn inertia_capsule(radius: f32, half_height: f32, mass: f32) -> Vec3 {
    let cylinder_volume = std::f32::consts::PI * radius * radius * (2.0 * half_height);
    let caps_volume = (4.0 / 3.0) * std::f32::consts::PI * radius * radius * radius;
    let total = (cylinder_volume + caps_volume).max(1e-12);
    let cylinder_mass = mass * cylinder_volume / total;
    let caps_mass = mass - cylinder_mass;

    let cyl = inertia_cylinder(radius, half_height, cylinder_mass);
    // Hemisphere pair treated as a sphere displaced to the cap centers.
    let sphere = inertia_sphere(radius, caps_mass);
    let offset = half_height * half_height * caps_mass;
    cyl + sphere + Vec3::new(offset, 0.0, offset)
}

/// Inertia tensor of a solid convex point cloud about `com`, approximated by
/// the covariance of its vertices carrying equal point masses.
pub fn inertia_point_cloud(points: &[Vec3], com: Vec3, mass: f32) -> Mat3 {
    if points.is_empty() {
        return Mat3::ZERO;
    }
    let point_mass = mass / points.len() as f32;
    let mut tensor = Mat3::ZERO;
    for &p in points {
        let r = p - com;
        let d = r.length_squared();
        let outer = Mat3::from_cols(r * r.x, r * r.y, r * r.z);
        tensor = add_mat3(
            tensor,
            mul_mat3(
                sub_mat3(Mat3::from_diagonal(Vec3::splat(d)), outer),
                point_mass,
            ),
        );
    }
    tensor
}

/// Diagonalizes a symmetric 3x3 matrix with cyclic Jacobi rotations.
/// Returns the principal values and the rotation mapping the principal frame
/// into the original frame.
pub fn diagonalize_symmetric(matrix: Mat3) -> (Vec3, Quat) {
    let mut a = matrix;
    let mut q = Quat::IDENTITY;

    for _ in 0..24 {
        let off = a.y_axis.x.abs() + a.z_axis.x.abs() + a.z_axis.y.abs();
        if off < 1e-9 {
            break;
        }
        // Rotate away the largest off-diagonal element.
        let (p, r) = largest_off_diagonal(&a);
        let app = element(&a, p, p);
        let arr = element(&a, r, r);
        let apr = element(&a, p, r);
        let theta = 0.5 * (2.0 * apr).atan2(app - arr);
        let rotation = Quat::from_axis_angle(axis_for(p, r), theta);
        let rot = Mat3::from_quat(rotation);
        a = rot.transpose() * a * rot;
        q = (q * rotation).normalize();
    }

    (Vec3::new(a.x_axis.x, a.y_axis.y, a.z_axis.z), q)
}

fn largest_off_diagonal(a: &Mat3) -> (usize, usize) {
    let xy = a.y_axis.x.abs();
    let xz = a.z_axis.x.abs();
    let yz = a.z_axis.y.abs();
    if xy >= xz && xy >= yz {
        (0, 1)
    } else if xz >= yz {
        (0, 2)
    } else {
        (1, 2)
    }
}

fn element(a: &Mat3, row: usize, col: usize) -> f32 {
    a.col(col)[row]
}

fn axis_for(p: usize, r: usize) -> Vec3 {
    // Signs chosen so the quaternion produces a positive plane rotation in
    // (p, r) index order.
    match (p, r) {
        (0, 1) => Vec3::Z,
        (0, 2) => Vec3::NEG_Y,
        _ => Vec3::X,
    }
}

fn add_mat3(a: Mat3, b: Mat3) -> Mat3 {
    Mat3::from_cols(a.x_axis + b.x_axis, a.y_axis + b.y_axis, a.z_axis + b.z_axis)
}

fn sub_mat3(a: Mat3, b: Mat3) -> Mat3 {
    Mat3::from_cols(a.x_axis - b.x_axis, a.y_axis - b.y_axis, a.z_axis - b.z_axis)
}

fn mul_mat3(a: Mat3, s: f32) -> Mat3 {
    Mat3::from_cols(a.x_axis * s, a.y_axis * s, a.z_axis * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonalize_recovers_rotated_diagonal() {
        let principal = Vec3::new(1.0, 4.0, 9.0);
        let rotation = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.7, 1.1);
        let rot = Mat3::from_quat(rotation);
        let tensor = rot * Mat3::from_diagonal(principal) * rot.transpose();

        let (values, q) = diagonalize_symmetric(tensor);
        let rebuilt =
            Mat3::from_quat(q) * Mat3::from_diagonal(values) * Mat3::from_quat(q).transpose();
        for col in 0..3 {
            assert!((rebuilt.col(col) - tensor.col(col)).length() < 1e-3);
        }
    }

    #[test]
    fn skew_matches_cross_product() {
        let v = Vec3::new(1.0, -2.0, 3.0);
        let w = Vec3::new(0.5, 4.0, -1.0);
        assert!((skew(v) * w - v.cross(w)).length() < 1e-6);
    }

    #[test]
    fn capsule_inertia_exceeds_sphere_inertia_laterally() {
        let sphere = inertia_sphere(0.5, 1.0);
        let capsule = inertia_capsule(0.5, 0.5, 1.0);
        assert!(capsule.x > sphere.x);
        assert!(capsule.z > sphere.z);
    }
}
