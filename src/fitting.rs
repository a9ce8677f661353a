use crate::atoms::Structure;
use crate::error::{FitError, Result};
use crate::qt::Quaternion;

pub type RotMat = [[f64; 3]; 3];

pub const IDENTITY: RotMat = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Least-squares superposition of two centroid-subtracted coordinate
/// sets. Builds the weighted correlation of the mobile onto the
/// reference, diagonalises the symmetric 4x4 quaternion form and returns
/// the proper rotation taking the mobile onto the reference
/// (`r * mob[i] ~ ref[i]`). A unit quaternion always yields det +1, so no
/// reflection can come back.
pub fn fit(
    reference: &[[f64; 3]],
    mobile: &[[f64; 3]],
    weights: Option<&[f64]>,
) -> Result<RotMat> {
    let n = reference.len();
    if n != mobile.len() {
        return Err(FitError::Mismatch(format!(
            "coordinate arrays differ in length ({} vs {})",
            n,
            mobile.len()
        )));
    }
    if n < 3 {
        return Err(FitError::Degenerate(format!(
            "fewer than 3 points to fit ({})",
            n
        )));
    }

    // s[a][b] = sum of w * mob_a * ref_b
    let mut s = [[0.0f64; 3]; 3];
    for i in 0..n {
        let w = weights.map_or(1.0, |ws| ws[i]);
        for a in 0..3 {
            for b in 0..3 {
                s[a][b] += w * mobile[i][a] * reference[i][b];
            }
        }
    }

    let (sxx, sxy, sxz) = (s[0][0], s[0][1], s[0][2]);
    let (syx, syy, syz) = (s[1][0], s[1][1], s[1][2]);
    let (szx, szy, szz) = (s[2][0], s[2][1], s[2][2]);

    let key = [
        [sxx + syy + szz, syz - szy, szx - sxz, sxy - syx],
        [syz - szy, sxx - syy - szz, sxy + syx, szx + sxz],
        [szx - sxz, sxy + syx, -sxx + syy - szz, syz + szy],
        [sxy - syx, szx + sxz, syz + szy, -sxx - syy + szz],
    ];

    let (values, vectors) = jacobi_eigen4(key);
    let mut top = 0;
    for i in 1..4 {
        if values[i] > values[top] {
            top = i;
        }
    }

    let mut q = Quaternion::new(
        vectors[0][top],
        vectors[1][top],
        vectors[2][top],
        vectors[3][top],
    );
    q.normalize();
    Ok(q.to_matrix())
}

/// Apply a rotation matrix to a vector.
pub fn rotate_point(m: &RotMat, p: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * p[0] + m[0][1] * p[1] + m[0][2] * p[2],
        m[1][0] * p[0] + m[1][1] * p[1] + m[1][2] * p[2],
        m[2][0] * p[0] + m[2][1] * p[1] + m[2][2] * p[2],
    ]
}

pub fn mat_mult33(a: &RotMat, b: &RotMat) -> RotMat {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                out[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    out
}

pub fn transpose33(m: &RotMat) -> RotMat {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = m[j][i];
        }
    }
    out
}

/// Produce the fitted copy of a mobile structure: translate to the
/// mobile centroid, rotate, translate to the reference centroid. The
/// source structure is left untouched and undefined-position sentinels
/// are preserved.
pub fn apply_transform(
    mobile: &Structure,
    rotmat: &RotMat,
    mob_centroid: [f64; 3],
    ref_centroid: [f64; 3],
) -> Structure {
    let mut fitted = mobile.clone();
    for atom in &mut fitted.atoms {
        if atom.is_undefined() {
            continue;
        }
        let centred = [
            atom.x - mob_centroid[0],
            atom.y - mob_centroid[1],
            atom.z - mob_centroid[2],
        ];
        let rotated = rotate_point(rotmat, centred);
        atom.set_xyz([
            rotated[0] + ref_centroid[0],
            rotated[1] + ref_centroid[1],
            rotated[2] + ref_centroid[2],
        ]);
    }
    fitted
}

/// Cyclic Jacobi diagonalisation of a symmetric 4x4 matrix. Returns the
/// eigenvalues and the matrix whose columns are the eigenvectors.
fn jacobi_eigen4(mut a: [[f64; 4]; 4]) -> ([f64; 4], [[f64; 4]; 4]) {
    let mut v = [[0.0f64; 4]; 4];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _sweep in 0..100 {
        let mut off = 0.0;
        for p in 0..4 {
            for q in (p + 1)..4 {
                off += a[p][q] * a[p][q];
            }
        }
        if off < 1e-24 {
            break;
        }

        for p in 0..4 {
            for q in (p + 1)..4 {
                if a[p][q].abs() < 1e-30 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = if theta >= 0.0 {
                    1.0 / (theta + (1.0 + theta * theta).sqrt())
                } else {
                    1.0 / (theta - (1.0 + theta * theta).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                for k in 0..4 {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..4 {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for k in 0..4 {
                    let vkp = v[k][p];
                    let vkq = v[k][q];
                    v[k][p] = c * vkp - s * vkq;
                    v[k][q] = s * vkp + c * vkq;
                }
            }
        }
    }

    ([a[0][0], a[1][1], a[2][2], a[3][3]], v)
}

/// Arithmetic mean of a coordinate set.
pub fn centroid(points: &[[f64; 3]]) -> [f64; 3] {
    let mut c = [0.0; 3];
    for p in points {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    let n = points.len().max(1) as f64;
    [c[0] / n, c[1] / n, c[2] / n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qt::Quaternion;
    use rand::SeedableRng;

    fn centre(points: &[[f64; 3]]) -> (Vec<[f64; 3]>, [f64; 3]) {
        let c = centroid(points);
        let centred = points
            .iter()
            .map(|p| [p[0] - c[0], p[1] - c[1], p[2] - c[2]])
            .collect();
        (centred, c)
    }

    fn assert_mat_close(a: &RotMat, b: &RotMat, tol: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (a[i][j] - b[i][j]).abs() < tol,
                    "matrices differ at ({}, {}): {} vs {}",
                    i,
                    j,
                    a[i][j],
                    b[i][j]
                );
            }
        }
    }

    #[test]
    fn identity_fit() {
        let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let (centred, cog) = centre(&points);
        assert!((cog[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((cog[1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(cog[2], 0.0);

        let r = fit(&centred, &centred, None).unwrap();
        assert_mat_close(&r, &IDENTITY, 1e-9);
    }

    #[test]
    fn ninety_degree_rotation_about_z() {
        // Mobile is the reference triangle rotated +90 degrees about z
        let reference = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mobile = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]];
        let (ref_c, _) = centre(&reference);
        let (mob_c, _) = centre(&mobile);

        let r = fit(&ref_c, &mob_c, None).unwrap();
        // The recovered matrix rotates the mobile back onto the reference
        let expected = [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert_mat_close(&r, &expected, 1e-9);

        for i in 0..3 {
            let p = rotate_point(&r, mob_c[i]);
            for k in 0..3 {
                assert!((p[k] - ref_c[i][k]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn recovers_random_rotations() {
        let mut rng = SeedableRng::seed_from_u64(324_324);
        let reference = [
            [1.0, 2.0, 3.0],
            [-2.0, 0.5, 1.0],
            [0.0, -1.0, 2.0],
            [4.0, 1.0, -2.0],
            [-1.5, 2.5, 0.5],
        ];
        for _ in 0..20 {
            let q = Quaternion::random(&mut rng);
            let t = [3.0, -7.0, 11.0];
            let mobile: Vec<[f64; 3]> = reference
                .iter()
                .map(|p| {
                    let r = q.rotate(*p);
                    [r[0] + t[0], r[1] + t[1], r[2] + t[2]]
                })
                .collect();

            let (ref_c, _) = centre(&reference);
            let (mob_c, _) = centre(&mobile);
            let r = fit(&ref_c, &mob_c, None).unwrap();

            // The fitted rotation undoes the applied one
            let expected = transpose33(&q.to_matrix());
            assert_mat_close(&r, &expected, 1e-9);

            let mut sum_sq = 0.0;
            for i in 0..ref_c.len() {
                let p = rotate_point(&r, mob_c[i]);
                for k in 0..3 {
                    sum_sq += (p[k] - ref_c[i][k]).powi(2);
                }
            }
            assert!((sum_sq / ref_c.len() as f64).sqrt() < 1e-9);
        }
    }

    #[test]
    fn uniform_weights_do_not_change_the_rotation() {
        let reference = [[1.0, 2.0, 3.0], [-2.0, 0.5, 1.0], [0.0, -1.0, 2.0], [4.0, 1.0, -2.0]];
        let mobile = [[2.0, 1.0, 3.5], [-1.0, -0.5, 1.0], [0.5, -1.0, 2.0], [3.0, 2.0, -2.0]];
        let (ref_c, _) = centre(&reference);
        let (mob_c, _) = centre(&mobile);

        let plain = fit(&ref_c, &mob_c, None).unwrap();
        let weighted = fit(&ref_c, &mob_c, Some(&[5.0, 5.0, 5.0, 5.0])).unwrap();
        assert_mat_close(&plain, &weighted, 1e-9);
    }

    #[test]
    fn weighted_fit_prefers_heavy_points() {
        // Both point sets have a zero centroid. The first pair supports a
        // 90-degree rotation about z, the second supports the identity;
        // whichever pair carries the weight wins.
        let reference = [
            [2.0, 0.0, 0.0],
            [-2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, -2.0, 0.0],
        ];
        let mobile = [
            [0.0, 2.0, 0.0],
            [0.0, -2.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, -2.0, 0.0],
        ];

        let heavy_rot = fit(&reference, &mobile, Some(&[1000.0, 1000.0, 0.001, 0.001])).unwrap();
        let p = rotate_point(&heavy_rot, mobile[0]);
        assert!((p[0] - 2.0).abs() < 0.05);
        assert!(p[1].abs() < 0.05);

        let heavy_id = fit(&reference, &mobile, Some(&[0.001, 0.001, 1000.0, 1000.0])).unwrap();
        let p = rotate_point(&heavy_id, mobile[2]);
        assert!(p[0].abs() < 0.05);
        assert!((p[1] - 2.0).abs() < 0.05);
    }

    #[test]
    fn degenerate_fit_is_refused() {
        let two = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        assert!(matches!(
            fit(&two, &two, None),
            Err(FitError::Degenerate(_))
        ));
    }

    #[test]
    fn transform_preserves_undefined_atoms() {
        use crate::atoms::testutil::structure;
        let s = structure(&[
            ("A", 1, ' ', "ALA", &[(" CA ", 1.0, 2.0, 3.0)]),
            ("A", 2, ' ', "ALA", &[(" CA ", 9999.0, 9999.0, 9999.0)]),
        ]);
        let moved = apply_transform(&s, &IDENTITY, [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
        assert_eq!(moved.atoms[0].xyz(), [0.0, 1.0, 2.0]);
        assert!(moved.atoms[1].is_undefined());
    }
}
