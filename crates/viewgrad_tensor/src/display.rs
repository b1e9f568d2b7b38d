use crate::Tensor;
use std::fmt;

const MAX_ELEMENTS_PER_DIM: usize = 4;

/// Which positions of a length-`len` axis get printed.
fn shown(len: usize) -> (usize, usize) {
    if len <= MAX_ELEMENTS_PER_DIM * 2 {
        (len, 0)
    } else {
        (MAX_ELEMENTS_PER_DIM, MAX_ELEMENTS_PER_DIM)
    }
}

fn display_nested(f: &mut fmt::Formatter<'_>, data: &[f64], shape: &[usize], depth: usize, width: usize) -> fmt::Result {
    let Some((&dim, rest)) = shape.split_first() else {
        return match data.first() {
            Some(value) => write!(f, "{:>width$.6}", value, width = width),
            None => write!(f, "[]"),
        };
    };
    let stride: usize = rest.iter().product();
    let (show_start, show_end) = shown(dim);
    let separator = |f: &mut fmt::Formatter<'_>| {
        if rest.is_empty() || depth >= 2 {
            write!(f, ", ")
        } else {
            write!(f, ",\n{}", " ".repeat(depth + 1))
        }
    };

    write!(f, "[")?;
    for i in 0..show_start {
        if i > 0 {
            separator(f)?;
        }
        display_nested(f, &data[i * stride..(i + 1) * stride], rest, depth + 1, width)?;
    }
    if show_end > 0 {
        separator(f)?;
        write!(f, "...")?;
        for i in (dim - show_end)..dim {
            separator(f)?;
            display_nested(f, &data[i * stride..(i + 1) * stride], rest, depth + 1, width)?;
        }
    }
    write!(f, "]")
}

fn debug_format_data(data: &[f64]) -> String {
    let (show_start, show_end) = shown(data.len());
    let mut parts: Vec<String> = data[..show_start].iter().map(|v| format!("{:.6}", v)).collect();
    if show_end > 0 {
        parts.push("...".to_string());
        parts.extend(data[data.len() - show_end..].iter().map(|v| format!("{:.6}", v)));
    }
    format!("[{}]", parts.join(", "))
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let array = self.try_to_array().map_err(|_| fmt::Error)?;
        let width = array
            .data()
            .iter()
            .map(|v| format!("{:.6}", v).len())
            .max()
            .unwrap_or(0);
        display_nested(f, array.data(), array.shape(), 0, width)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(array) = self.try_to_array() else {
            return write!(f, "Tensor(id={:?}, released)", self.id());
        };
        write!(f, "Tensor(shape={:?}, data={}", array.shape(), debug_format_data(array.data()))?;
        write!(f, ", constant={}", self.is_constant())?;
        if let Some(name) = self.creator_name() {
            write!(f, ", creator={}", name)?;
        }
        if self.is_view() {
            write!(f, ", view")?;
        }
        write!(f, ")")
    }
}
