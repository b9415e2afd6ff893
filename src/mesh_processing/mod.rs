// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 the surftri authors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

pub mod bary;
pub mod fit;
pub mod quality;
pub mod refine;
pub mod topology;

/// Minimum improvement a swap must deliver before it is taken.
pub(crate) const ANGTOL: f64 = 1.0e-6;
/// Parameter-space angle above which chord refinement gives up on a facet.
pub(crate) const DEVANG: f64 = 2.65;
/// Parameter-space angle above which centroid insertion gives up on a facet.
pub(crate) const CUTANG: f64 = 3.10;
/// Parameter-space angle that disqualifies the triangles a swap would make.
pub(crate) const MAXANG: f64 = 3.13;
/// Orientation-fault budget; the scheduler leaves its phase past this.
pub(crate) const MAX_OR_CNT: u32 = 500;
/// Neighbourhood radius suppressing re-visits around a fresh split.
pub(crate) const FLOOD_DEPTH: u32 = 6;
