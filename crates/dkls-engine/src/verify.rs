//! Textbook secp256k1 ECDSA verification against a pre-hashed digest.
//!
//! `dkls-integration-tests` uses this to check the §8 invariant that a
//! DSG artifact's `(r, s)` verifies under the group's `public_key` and
//! the digest the session was constructed with — independent of which
//! `MpcEngine` produced it.

use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, ProjectivePoint, PublicKey, Scalar};

use dkls_types::share::PublicKeyBytes;

fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    let repr: k256::FieldBytes = (*bytes).into();
    Option::from(Scalar::from_repr(repr))
}

/// Verify `(r, s)` over `digest` under `public_key`.
///
/// Returns `false` (never panics) for a malformed public key, an
/// out-of-range `r`/`s`, or a genuinely invalid signature.
pub fn verify(public_key: &PublicKeyBytes, digest: &[u8; 32], r: &[u8; 32], s: &[u8; 32]) -> bool {
    let Ok(public_key) = PublicKey::from_sec1_bytes(&public_key.0) else {
        return false;
    };
    let Some(r_scalar) = scalar_from_bytes(r) else {
        return false;
    };
    let Some(s_scalar) = scalar_from_bytes(s) else {
        return false;
    };
    if bool::from(r_scalar.is_zero()) || bool::from(s_scalar.is_zero()) {
        return false;
    }
    let Some(z) = scalar_from_bytes(digest) else {
        return false;
    };

    let s_inv: Scalar = match Option::from(s_scalar.invert()) {
        Some(inv) => inv,
        None => return false,
    };
    let u1 = z * s_inv;
    let u2 = r_scalar * s_inv;

    let point: ProjectivePoint =
        ProjectivePoint::GENERATOR * u1 + ProjectivePoint::from(*public_key.as_affine()) * u2;
    if bool::from(point.is_identity()) {
        return false;
    }
    let affine: AffinePoint = point.to_affine();
    let encoded = affine.to_encoded_point(false);
    let Some(x_bytes) = encoded.x() else {
        return false;
    };
    let mut x_arr = [0u8; 32];
    x_arr.copy_from_slice(x_bytes.as_slice());
    let Some(x_scalar) = scalar_from_bytes(&x_arr) else {
        return false;
    };

    x_scalar == r_scalar
}
