use std::fmt::{self, Debug, Display};

use crate::core::{deriv_buffer, param_buffer};

fn n_digits(u: usize) -> usize {
    match u {
        0 => 1,
        u => ((u as f64).log10() + 1.0) as usize,
    }
}

/// Name of the input of layer `i_layer`, `x` for the first layer.
fn input_name(i_layer: usize) -> String {
    match i_layer.checked_sub(1) {
        None => "x".to_string(),
        Some(i_previous) => format!("a_{i_previous}"),
    }
}

fn write_row(f: &mut fmt::Formatter, row: &[f64], precision: usize) -> fmt::Result {
    write!(f, "[")?;
    for (i, element) in row.iter().enumerate() {
        if i != 0 {
            write!(f, " ")?;
        }
        // Leave room for the minus sign so that columns line up.
        if element.is_sign_positive() {
            write!(f, " ")?;
        }
        write!(f, "{element:.precision$}")?;
    }
    write!(f, "]")
}

/// Writes `a_u = phi([W] x + [b])`, one matrix row per line, the equation on the center line.
fn write_layer(
    f: &mut fmt::Formatter,
    i_layer: usize,
    phi: &str,
    n_previous: usize,
    w: &[f64],
    b: &[f64],
    precision: usize,
) -> fmt::Result {
    let n = b.len();
    let center_line = n / 2;
    let input = input_name(i_layer);
    for (i_line, (row, bias)) in w.chunks_exact(n_previous).zip(b).enumerate() {
        if i_line == center_line {
            write!(f, "a_{i_layer} = {phi}(")?;
        } else {
            write!(f, "{:width$}", "", width = phi.len() + n_digits(i_layer) + 6)?;
        }
        write_row(f, row, precision)?;
        if i_line == center_line {
            write!(f, " {input} + ")?;
        } else {
            write!(f, "{:width$}", "", width = input.len() + 4)?;
        }
        write_row(f, std::slice::from_ref(bias), precision)?;
        if i_line == center_line {
            write!(f, ")")?;
        }
        if i_line + 1 != n {
            writeln!(f)?;
        }
    }
    Ok(())
}

pub struct PrettyPrintParams<'a> {
    layer: param_buffer::LayerRef<'a>,
}

impl<'a> PrettyPrintParams<'a> {
    pub fn new(layer: param_buffer::LayerRef<'a>) -> Self {
        Self { layer }
    }
}

impl Debug for PrettyPrintParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for PrettyPrintParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let layer = self.layer;
        let w: Vec<f64> = layer.nodes().flat_map(|node| node.weights).copied().collect();
        let b: Vec<f64> = layer.nodes().map(|node| node.bias).collect();
        let precision = f.precision().unwrap_or(4);
        write_layer(
            f,
            layer.index,
            &layer.phi.to_string(),
            layer.n_previous,
            &w,
            &b,
            precision,
        )
    }
}

pub struct PrettyPrintDerivs<'a> {
    layer: deriv_buffer::LayerRef<'a>,
}

impl<'a> PrettyPrintDerivs<'a> {
    pub fn new(layer: deriv_buffer::LayerRef<'a>) -> Self {
        Self { layer }
    }
}

impl Debug for PrettyPrintDerivs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for PrettyPrintDerivs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let layer = self.layer;
        let precision = f.precision().unwrap_or(12);
        write_layer(
            f,
            layer.index,
            "phi",
            layer.n_previous,
            layer.dw,
            layer.db,
            precision,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{Activation, DerivBuffer, ParamBuffer, Topology};

    fn topology() -> Topology {
        Topology::from_sizes(2, &[3, 1], &[Activation::Tanh, Activation::Sigmoid]).unwrap()
    }

    #[test]
    fn params() {
        let params = ParamBuffer::from_nested(
            &topology(),
            &[
                vec![vec![1.0, -2.0], vec![0.5, 0.25], vec![0.0, 3.0]],
                vec![vec![1.0, 1.0, -1.0]],
            ],
            &[vec![0.1, -0.2, 0.0], vec![0.5]],
        )
        .unwrap();
        let printed = format!("{:.2}", params.pretty_print_layer(0).unwrap());
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "a_0 = tanh([ 0.50  0.25] x + [-0.20])");
        assert_eq!(lines[0].len(), lines[1].len() - 1);
        assert_eq!(
            format!("{:.1}", params.pretty_print_layer(1).unwrap()),
            "a_1 = sigmoid([ 1.0  1.0 -1.0] a_0 + [ 0.5])"
        );
        assert!(params.pretty_print_layer(2).is_none());
    }

    #[test]
    fn derivs() {
        let derivs = DerivBuffer::create(&topology());
        assert_eq!(
            format!("{:.0}", derivs.pretty_print_layer(1).unwrap()),
            "a_1 = phi([ 0  0  0] a_0 + [ 0])"
        );
    }
}
