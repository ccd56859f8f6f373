// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! ECVRF-EDWARDS25519-SHA512-TAI, as specified in
//! [RFC 9381](https://www.rfc-editor.org/rfc/rfc9381.html), used to map identifiers to
//! commitment indexes without revealing the mapping to anyone lacking a proof.

use crate::error::VrfError;
use crate::proto::{CommitmentIndex, INDEX_SIZE};
use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

const SUITE: u8 = 0x03;
const CHALLENGE_SIZE: usize = 16;

/// Size of an encoded VRF proof: Gamma (32) || c (16) || s (32).
pub const PROOF_SIZE: usize = 32 + CHALLENGE_SIZE + 32;

/// A VRF public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrfPublicKey {
    point: EdwardsPoint,
    bytes: [u8; 32],
}

impl VrfPublicKey {
    /// Decodes a public key.
    ///
    /// # Errors
    ///
    /// Returns [`VrfError::MalformedPublicKey`] if the bytes are not a point on the curve or
    /// the point has small order.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, VrfError> {
        let point = CompressedEdwardsY(*bytes)
            .decompress()
            .ok_or(VrfError::MalformedPublicKey)?;
        if point.is_small_order() {
            return Err(VrfError::MalformedPublicKey);
        }
        Ok(Self {
            point,
            bytes: *bytes,
        })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    /// Verifies `proof` for `alpha` and returns the 64-byte VRF output.
    ///
    /// # Errors
    ///
    /// Returns [`VrfError::InvalidVrfProof`] if the proof is malformed or does not verify.
    pub fn verify(&self, alpha: &[u8], proof: &[u8]) -> Result<[u8; 64], VrfError> {
        let proof: &[u8; PROOF_SIZE] = proof.try_into().map_err(|_| VrfError::InvalidVrfProof)?;
        let (gamma, c, s) = decode_proof(proof)?;

        let h = encode_to_curve(&self.bytes, alpha)?;
        let c_scalar = challenge_scalar(&c);
        let u = EdwardsPoint::mul_base(&s) - c_scalar * self.point;
        let v = s * h - c_scalar * gamma;

        let expected = challenge(&[&self.point, &h, &gamma, &u, &v]);
        if !bool::from(expected[..].ct_eq(&c[..])) {
            return Err(VrfError::InvalidVrfProof);
        }
        Ok(proof_to_hash(&gamma))
    }
}

/// A VRF secret key, derived from a 32-byte seed the same way Ed25519 derives its scalar.
pub struct VrfSecretKey {
    scalar: Scalar,
    nonce_prefix: [u8; 32],
    public: VrfPublicKey,
}

impl VrfSecretKey {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let h: [u8; 64] = Sha512::digest(seed).into();
        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&h[..32]);
        scalar_bytes[0] &= 248;
        scalar_bytes[31] &= 127;
        scalar_bytes[31] |= 64;
        let scalar = Scalar::from_bytes_mod_order(scalar_bytes);

        let mut nonce_prefix = [0u8; 32];
        nonce_prefix.copy_from_slice(&h[32..]);

        let point = EdwardsPoint::mul_base(&scalar);
        let public = VrfPublicKey {
            point,
            bytes: point.compress().to_bytes(),
        };
        Self {
            scalar,
            nonce_prefix,
            public,
        }
    }

    pub fn public_key(&self) -> VrfPublicKey {
        self.public
    }

    /// Produces a proof for `alpha`.
    ///
    /// # Errors
    ///
    /// Returns [`VrfError::HashToCurve`] in the negligible case that `alpha` cannot be mapped to
    /// the curve.
    pub fn prove(&self, alpha: &[u8]) -> Result<[u8; PROOF_SIZE], VrfError> {
        let h = encode_to_curve(&self.public.bytes, alpha)?;
        let gamma = self.scalar * h;

        let nonce: [u8; 64] = Sha512::new()
            .chain_update(self.nonce_prefix)
            .chain_update(h.compress().as_bytes())
            .finalize()
            .into();
        let k = Scalar::from_bytes_mod_order_wide(&nonce);

        let c = challenge(&[
            &self.public.point,
            &h,
            &gamma,
            &EdwardsPoint::mul_base(&k),
            &(k * h),
        ]);
        let s = k + challenge_scalar(&c) * self.scalar;

        let mut proof = [0u8; PROOF_SIZE];
        proof[..32].copy_from_slice(gamma.compress().as_bytes());
        proof[32..32 + CHALLENGE_SIZE].copy_from_slice(&c);
        proof[32 + CHALLENGE_SIZE..].copy_from_slice(s.as_bytes());
        Ok(proof)
    }
}

/// Verifies the VRF proof for `identifier` and returns the identifier's commitment index.
///
/// # Errors
///
/// Returns [`VrfError::InvalidVrfProof`] if the proof does not verify under `key`.
pub fn resolve(
    key: &VrfPublicKey,
    identifier: &[u8],
    proof: &[u8],
) -> Result<CommitmentIndex, VrfError> {
    let output = key.verify(identifier, proof)?;
    let mut index = [0u8; INDEX_SIZE];
    index.copy_from_slice(&output[..INDEX_SIZE]);
    Ok(CommitmentIndex(index))
}

fn decode_proof(
    proof: &[u8; PROOF_SIZE],
) -> Result<(EdwardsPoint, [u8; CHALLENGE_SIZE], Scalar), VrfError> {
    let mut gamma = [0u8; 32];
    gamma.copy_from_slice(&proof[..32]);
    let gamma = CompressedEdwardsY(gamma)
        .decompress()
        .ok_or(VrfError::InvalidVrfProof)?;

    let mut c = [0u8; CHALLENGE_SIZE];
    c.copy_from_slice(&proof[32..32 + CHALLENGE_SIZE]);

    let mut s = [0u8; 32];
    s.copy_from_slice(&proof[32 + CHALLENGE_SIZE..]);
    let s = Option::<Scalar>::from(Scalar::from_canonical_bytes(s))
        .ok_or(VrfError::InvalidVrfProof)?;

    Ok((gamma, c, s))
}

// Try-and-increment hash to curve (RFC 9381, Section 5.4.1.1).
fn encode_to_curve(public_key: &[u8; 32], alpha: &[u8]) -> Result<EdwardsPoint, VrfError> {
    for ctr in 0..=u8::MAX {
        let digest = Sha512::new()
            .chain_update([SUITE, 0x01])
            .chain_update(public_key)
            .chain_update(alpha)
            .chain_update([ctr, 0x00])
            .finalize();
        let mut candidate = [0u8; 32];
        candidate.copy_from_slice(&digest[..32]);
        if let Some(point) = CompressedEdwardsY(candidate).decompress() {
            return Ok(point.mul_by_cofactor());
        }
    }
    Err(VrfError::HashToCurve)
}

// RFC 9381, Section 5.4.3.
fn challenge(points: &[&EdwardsPoint; 5]) -> [u8; CHALLENGE_SIZE] {
    let mut hasher = Sha512::new();
    hasher.update([SUITE, 0x02]);
    for point in points {
        hasher.update(point.compress().as_bytes());
    }
    hasher.update([0x00]);
    let digest = hasher.finalize();
    let mut c = [0u8; CHALLENGE_SIZE];
    c.copy_from_slice(&digest[..CHALLENGE_SIZE]);
    c
}

fn challenge_scalar(c: &[u8; CHALLENGE_SIZE]) -> Scalar {
    let mut bytes = [0u8; 32];
    bytes[..CHALLENGE_SIZE].copy_from_slice(c);
    Scalar::from_bytes_mod_order(bytes)
}

fn proof_to_hash(gamma: &EdwardsPoint) -> [u8; 64] {
    Sha512::new()
        .chain_update([SUITE, 0x03])
        .chain_update(gamma.mul_by_cofactor().compress().as_bytes())
        .chain_update([0x00])
        .finalize()
        .into()
}
